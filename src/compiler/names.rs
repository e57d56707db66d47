//! Fresh temporaries and labels.
//!
//! One generator lives for exactly one function's lowering and is threaded through the
//! recursion by `&mut`, so two functions never share counters and nothing is global.
use log::trace;

use super::ir::{Label, LabelKind, Temp};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameGen {
    next_temp: u32,
    next_label: u32,
}

impl NameGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temp(&mut self) -> Temp {
        let temp = Temp(self.next_temp);
        self.next_temp += 1;
        trace!("fresh temporary {temp}");
        temp
    }

    pub fn label(&mut self, kind: LabelKind) -> Label {
        let label = Label {
            kind,
            index: self.next_label,
        };
        self.next_label += 1;
        trace!("fresh label {label}");
        label
    }

    pub fn temps_issued(&self) -> u32 {
        self.next_temp
    }

    pub fn labels_issued(&self) -> u32 {
        self.next_label
    }
}
