//! Fixed-size little-endian records for binary WebSocket frames

use bytes::{Buf, BufMut, Bytes, BytesMut};
use glam::{Quat, Vec3};
use thiserror::Error;

use crate::vehicle::{BoostMeter, VehicleState};

use super::command::InputCommand;
use super::snapshot::ReconciliationSnapshot;

pub const COMMAND_TAG: u8 = 0x01;
pub const SNAPSHOT_TAG: u8 = 0x02;

/// tag + tick + 3 axes + boost flag
pub const COMMAND_LEN: usize = 1 + 4 + 3 * 4 + 1;

/// tag + tick + state (13 floats) + boost (f32, u8, f32) + drift flag + anti-roll + ground normal
pub const SNAPSHOT_LEN: usize = 1 + 4 + 13 * 4 + (4 + 1 + 4) + 1 + 4 + 3 * 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("empty frame")]
    Empty,

    #[error("unknown record tag {0:#04x}")]
    UnknownTag(u8),

    #[error("record tag {tag:#04x} needs {expected} bytes, got {actual}")]
    Length { tag: u8, expected: usize, actual: usize },

    #[error("non-finite value in {0}")]
    NonFinite(&'static str),

    #[error("flag byte {0} is neither 0 nor 1")]
    InvalidFlag(u8),
}

/// A decoded binary frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Frame {
    Command(InputCommand),
    Snapshot(ReconciliationSnapshot),
}

pub fn encode_command(command: &InputCommand) -> Bytes {
    let mut buf = BytesMut::with_capacity(COMMAND_LEN);
    buf.put_u8(COMMAND_TAG);
    buf.put_u32_le(command.tick);
    buf.put_f32_le(command.throttle);
    buf.put_f32_le(command.steering);
    buf.put_f32_le(command.brake);
    buf.put_u8(command.boost as u8);
    buf.freeze()
}

pub fn encode_snapshot(snapshot: &ReconciliationSnapshot) -> Bytes {
    let mut buf = BytesMut::with_capacity(SNAPSHOT_LEN);
    buf.put_u8(SNAPSHOT_TAG);
    buf.put_u32_le(snapshot.tick);

    let state = &snapshot.state;
    put_vec3(&mut buf, state.position);
    let rotation = state.rotation;
    for component in [rotation.x, rotation.y, rotation.z, rotation.w] {
        buf.put_f32_le(component);
    }
    put_vec3(&mut buf, state.linear_velocity);
    put_vec3(&mut buf, state.angular_velocity);

    buf.put_f32_le(snapshot.boost.percent());
    buf.put_u8(snapshot.boost.fully_used as u8);
    buf.put_f32_le(snapshot.boost.recharge_timer);
    buf.put_u8(snapshot.was_drifting as u8);
    buf.put_f32_le(snapshot.anti_roll_torque);
    put_vec3(&mut buf, snapshot.last_ground_normal);
    buf.freeze()
}

/// Decode any record, dispatching on its tag
pub fn decode(frame: &[u8]) -> Result<Frame, CodecError> {
    match frame.first() {
        None => Err(CodecError::Empty),
        Some(&COMMAND_TAG) => decode_command(frame).map(Frame::Command),
        Some(&SNAPSHOT_TAG) => decode_snapshot(frame).map(Frame::Snapshot),
        Some(&tag) => Err(CodecError::UnknownTag(tag)),
    }
}

pub fn decode_command(frame: &[u8]) -> Result<InputCommand, CodecError> {
    let mut buf = expect_record(frame, COMMAND_TAG, COMMAND_LEN)?;

    let tick = buf.get_u32_le();
    let throttle = finite(buf.get_f32_le(), "throttle")?;
    let steering = finite(buf.get_f32_le(), "steering")?;
    let brake = finite(buf.get_f32_le(), "brake")?;
    let boost = flag(buf.get_u8())?;

    Ok(InputCommand::new(throttle, steering, brake, boost).with_tick(tick))
}

pub fn decode_snapshot(frame: &[u8]) -> Result<ReconciliationSnapshot, CodecError> {
    let mut buf = expect_record(frame, SNAPSHOT_TAG, SNAPSHOT_LEN)?;

    let tick = buf.get_u32_le();
    let position = get_vec3(&mut buf, "position")?;
    let rotation = Quat::from_xyzw(
        finite(buf.get_f32_le(), "rotation")?,
        finite(buf.get_f32_le(), "rotation")?,
        finite(buf.get_f32_le(), "rotation")?,
        finite(buf.get_f32_le(), "rotation")?,
    );
    let linear_velocity = get_vec3(&mut buf, "linear velocity")?;
    let angular_velocity = get_vec3(&mut buf, "angular velocity")?;

    let percent = finite(buf.get_f32_le(), "boost percent")?;
    let fully_used = flag(buf.get_u8())?;
    let recharge_timer = finite(buf.get_f32_le(), "boost recharge timer")?;
    let was_drifting = flag(buf.get_u8())?;
    let anti_roll_torque = finite(buf.get_f32_le(), "anti-roll torque")?;
    let last_ground_normal = get_vec3(&mut buf, "ground normal")?;

    Ok(ReconciliationSnapshot {
        tick,
        state: VehicleState {
            position,
            rotation,
            linear_velocity,
            angular_velocity,
        },
        boost: BoostMeter::new(percent, fully_used, recharge_timer),
        was_drifting,
        anti_roll_torque,
        last_ground_normal,
    })
}

/// Check tag and length, returning the payload after the tag
fn expect_record(frame: &[u8], tag: u8, len: usize) -> Result<&[u8], CodecError> {
    match frame.first() {
        None => return Err(CodecError::Empty),
        Some(&actual) if actual != tag => return Err(CodecError::UnknownTag(actual)),
        Some(_) => {}
    }
    if frame.len() != len {
        return Err(CodecError::Length {
            tag,
            expected: len,
            actual: frame.len(),
        });
    }
    Ok(&frame[1..])
}

fn finite(value: f32, field: &'static str) -> Result<f32, CodecError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CodecError::NonFinite(field))
    }
}

fn flag(byte: u8) -> Result<bool, CodecError> {
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(CodecError::InvalidFlag(other)),
    }
}

fn put_vec3(buf: &mut BytesMut, v: Vec3) {
    buf.put_f32_le(v.x);
    buf.put_f32_le(v.y);
    buf.put_f32_le(v.z);
}

fn get_vec3(buf: &mut &[u8], field: &'static str) -> Result<Vec3, CodecError> {
    Ok(Vec3::new(
        finite(buf.get_f32_le(), field)?,
        finite(buf.get_f32_le(), field)?,
        finite(buf.get_f32_le(), field)?,
    ))
}
