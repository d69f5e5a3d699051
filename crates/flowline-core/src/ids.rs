// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Typed identifiers.
//!
//! Every id is a distinct nominal type over `i64`; interchange between kinds
//! requires explicit construction. `#[sqlx(transparent)]` keeps them bindable
//! as plain bigints, including inside `= ANY($1)` array binds.

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Serialize,
            Deserialize,
            sqlx::Type,
        )]
        #[sqlx(transparent)]
        pub struct $name(
            /// Raw database value.
            pub i64,
        );

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of an organization.
    OrgID
);
id_type!(
    /// Identifier of a contact.
    ContactID
);
id_type!(
    /// Identifier of a flow.
    FlowID
);
id_type!(
    /// Identifier of a persisted session.
    SessionID
);
id_type!(
    /// Identifier of a persisted run.
    RunID
);
id_type!(
    /// Identifier of a channel connection (e.g. a voice call).
    ConnectionID
);
id_type!(
    /// Identifier of a flow start.
    StartID
);
id_type!(
    /// Identifier of a channel.
    ChannelID
);
id_type!(
    /// Identifier of a contact group.
    GroupID
);
id_type!(
    /// Identifier of a campaign event.
    CampaignEventID
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_serde() {
        assert_eq!(ContactID(42).to_string(), "42");
        assert_eq!(serde_json::to_string(&FlowID(7)).unwrap(), "7");
        assert_eq!(serde_json::from_str::<SessionID>("9").unwrap(), SessionID(9));
    }
}
