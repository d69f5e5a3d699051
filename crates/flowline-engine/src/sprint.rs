// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The ordered event list produced by one engine invocation.

use serde::{Deserialize, Serialize};

use crate::events::Event;

/// The output of a single engine invocation: every event emitted while
/// advancing the session, in emission order. A sprint is the atomic unit of
/// advance; the backend commits its state transition and events together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sprint {
    /// Events in emission order.
    #[serde(default)]
    pub events: Vec<Event>,
}

impl Sprint {
    /// Returns true if any event in this sprint is a received message.
    pub fn received_input(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, Event::MsgReceived { .. }))
    }
}
