//! Client prediction and server reconciliation
//!
//! The owning client stamps each input with a tick, runs it immediately and
//! keeps it. The authority runs the same commands as they arrive and sends
//! back snapshots; the client overwrites its state with each fresh snapshot
//! and replays the commands the authority has not covered yet.

pub mod buffer;
pub mod codec;
pub mod command;
pub mod link;
pub mod snapshot;
pub mod vehicle;

pub use buffer::{CommandBuffer, DEFAULT_COMMAND_CAPACITY};
pub use codec::{CodecError, Frame};
pub use command::{InputCommand, Tick};
pub use link::{LinkConfig, LossyLink};
pub use snapshot::ReconciliationSnapshot;
pub use vehicle::{
    AdvanceReport, CommandReceipt, CommandSource, NetRole, NetworkedVehicle, ReconcileOutcome, SessionError,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{GroundPatch, Pose, Sandbox, SandboxBody};
    use crate::vehicle::{VehicleController, VehicleConfig};
    use glam::{Quat, Vec3};

    const DT: f32 = 1.0 / 60.0;

    fn world(config: &VehicleConfig) -> Sandbox {
        let pose = Pose::new(Vec3::new(0.0, config.ride_height() - 0.04, 0.0), Quat::IDENTITY);
        Sandbox::new(SandboxBody::solid_box(config.mass, config.chassis_half_extents, pose))
            .with_ground(GroundPatch::infinite(0.0))
    }

    fn pair() -> (NetworkedVehicle<Sandbox>, NetworkedVehicle<Sandbox>) {
        let config = VehicleConfig::default();
        let client = NetworkedVehicle::predicting(VehicleController::new(config), world(&config), DT, 256);
        let server = NetworkedVehicle::authoritative(VehicleController::new(config), world(&config), DT, 256);
        (client, server)
    }

    fn driver_input(i: u32) -> InputCommand {
        let steering = ((i as f32) * 0.03).sin();
        let drifting = (i / 50) % 3 == 2;
        InputCommand::new(1.0, steering, if drifting { 1.0 } else { 0.0 }, i % 90 < 20)
    }

    /// Wire both directions through the binary codec
    fn ship_command(command: &InputCommand) -> InputCommand {
        match codec::decode(&codec::encode_command(command)) {
            Ok(Frame::Command(command)) => command,
            other => panic!("bad command frame {other:?}"),
        }
    }

    fn ship_snapshot(snapshot: &ReconciliationSnapshot) -> ReconciliationSnapshot {
        match codec::decode(&codec::encode_snapshot(snapshot)) {
            Ok(Frame::Snapshot(snapshot)) => snapshot,
            other => panic!("bad snapshot frame {other:?}"),
        }
    }

    #[test]
    fn test_reordered_delivery_never_needs_correction() {
        let (mut client, mut server) = pair();
        let jitter = LinkConfig {
            drop_chance: 0.0,
            duplicate_chance: 0.1,
            min_latency: 1,
            max_latency: 6,
        };
        let mut uplink = LossyLink::new(11, jitter);
        let mut downlink = LossyLink::new(12, jitter);
        let mut applied = 0;

        for i in 1..=240 {
            let sent = client.predict(driver_input(i)).unwrap();
            uplink.send(sent);

            for command in uplink.advance() {
                server.receive_command(ship_command(&command)).unwrap();
            }
            while server.next_ready() {
                let (snapshot, _) = server.advance().unwrap();
                downlink.send(snapshot);
            }

            for snapshot in downlink.advance() {
                match client.receive_snapshot(&ship_snapshot(&snapshot)).unwrap() {
                    ReconcileOutcome::Applied { correction, replayed } => {
                        assert_eq!(correction, 0.0, "tick {}", snapshot.tick);
                        assert_eq!(replayed as u32, client.tick() - snapshot.tick);
                        applied += 1;
                    }
                    ReconcileOutcome::Stale => {}
                    other => panic!("unexpected outcome {other:?}"),
                }
            }
        }

        assert!(applied > 100);
    }

    #[test]
    fn test_lossy_loopback_converges() {
        let (mut client, mut server) = pair();
        let mut uplink = LossyLink::new(3, LinkConfig::default());
        let mut downlink = LossyLink::new(4, LinkConfig::default());
        let mut starved = 0;
        let mut last_sent = None;

        for i in 1..=300 {
            let sent = client.predict(driver_input(i)).unwrap();
            uplink.send(sent);
            last_sent = Some(sent);

            for command in uplink.advance() {
                server.receive_command(command).unwrap();
            }

            // Wait a couple of ticks for a missing command before holding input
            if server.next_ready() || (server.backlog() > 0 && starved >= 2) {
                starved = 0;
                let (snapshot, _) = server.advance().unwrap();
                downlink.send(snapshot);
            } else if server.backlog() > 0 {
                starved += 1;
            }

            for snapshot in downlink.advance() {
                let outcome = client.receive_snapshot(&snapshot).unwrap();
                assert!(!matches!(outcome, ReconcileOutcome::Rejected | ReconcileOutcome::Ahead));
            }
            assert!(client.state().is_finite());
        }

        // Flush: deliver what is left, resend the newest command, catch the authority up
        for command in uplink.drain() {
            server.receive_command(command).unwrap();
        }
        if let Some(last) = last_sent {
            server.receive_command(last).unwrap();
        }
        let mut final_snapshot = server.snapshot();
        while server.tick() < client.tick() {
            final_snapshot = server.advance().unwrap().0;
        }
        assert_eq!(final_snapshot.tick, client.tick());

        let outcome = client.receive_snapshot(&final_snapshot).unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Applied { replayed: 0, .. }));
        assert_eq!(client.state(), server.state());
        assert_eq!(client.controller().driving().boost_meter, server.controller().driving().boost_meter);
    }
}
