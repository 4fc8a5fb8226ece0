use std::collections::BTreeMap;

use tracing::debug;

use super::command::{InputCommand, Tick};

/// Default number of commands kept per vehicle (two seconds at 60 Hz)
pub const DEFAULT_COMMAND_CAPACITY: usize = 120;

/// Commands keyed by tick, iterated in ascending tick order
#[derive(Debug, Clone)]
pub struct CommandBuffer {
    commands: BTreeMap<Tick, InputCommand>,
    capacity: usize,
}

impl CommandBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            commands: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Insert a command. Returns false if one with the same tick is already held.
    pub fn insert(&mut self, command: InputCommand) -> bool {
        if self.commands.contains_key(&command.tick) {
            return false;
        }
        self.commands.insert(command.tick, command);

        while self.commands.len() > self.capacity {
            if let Some((dropped, _)) = self.commands.pop_first() {
                debug!(tick = dropped, capacity = self.capacity, "Command buffer full, dropping oldest");
            }
        }
        true
    }

    pub fn get(&self, tick: Tick) -> Option<&InputCommand> {
        self.commands.get(&tick)
    }

    pub fn remove(&mut self, tick: Tick) -> Option<InputCommand> {
        self.commands.remove(&tick)
    }

    /// Drop every command at or before `tick`
    pub fn discard_through(&mut self, tick: Tick) {
        self.commands = self.commands.split_off(&tick.saturating_add(1));
        if tick == Tick::MAX {
            self.commands.clear();
        }
    }

    /// Commands after `tick`, ascending
    pub fn after(&self, tick: Tick) -> impl Iterator<Item = &InputCommand> {
        self.commands
            .range((std::ops::Bound::Excluded(tick), std::ops::Bound::Unbounded))
            .map(|(_, command)| command)
    }

    pub fn first_tick(&self) -> Option<Tick> {
        self.commands.keys().next().copied()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_CAPACITY)
    }
}
