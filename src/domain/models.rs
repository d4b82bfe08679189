use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CHALLENGE_DAYS: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellState {
    Pending,
    Done,
    Missed,
}

impl CellState {
    pub fn next(self) -> CellState {
        match self {
            Self::Pending => Self::Done,
            Self::Done => Self::Missed,
            Self::Missed => Self::Pending,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Missed => "missed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub cells: BTreeMap<u8, CellState>,
    pub order: u32,
}

impl Task {
    pub fn new(id: impl Into<String>, order: u32) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            cells: BTreeMap::new(),
            order,
        }
    }

    pub fn cell_state(&self, day: u8) -> CellState {
        self.cells.get(&day).copied().unwrap_or(CellState::Pending)
    }

    // Pending is encoded as key absence; the map never stores it.
    pub fn set_cell(&mut self, day: u8, state: CellState) {
        match state {
            CellState::Pending => {
                self.cells.remove(&day);
            }
            CellState::Done | CellState::Missed => {
                self.cells.insert(day, state);
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("task.id must not be empty".to_string());
        }
        for (day, state) in &self.cells {
            if *day >= CHALLENGE_DAYS {
                return Err(format!(
                    "task.cells day index {day} out of range 0..{CHALLENGE_DAYS}"
                ));
            }
            if *state == CellState::Pending {
                return Err(format!(
                    "task.cells day index {day} stores an explicit pending state"
                ));
            }
        }
        Ok(())
    }
}

pub fn validate_collection(tasks: &[Task]) -> Result<(), String> {
    for task in tasks {
        task.validate()?;
    }
    for (position, task) in tasks.iter().enumerate() {
        if task.order as usize != position {
            return Err(format!(
                "task {} has order {} at position {position}",
                task.id, task.order
            ));
        }
        if tasks[..position].iter().any(|other| other.id == task.id) {
            return Err(format!("duplicate task id {}", task.id));
        }
    }
    Ok(())
}

pub fn reindex(tasks: &mut [Task]) {
    for (position, task) in tasks.iter_mut().enumerate() {
        task.order = position as u32;
    }
}

pub fn splice_move(tasks: &mut Vec<Task>, source: usize, dest: usize) {
    let moved = tasks.remove(source);
    tasks.insert(dest, moved);
    reindex(tasks);
}
