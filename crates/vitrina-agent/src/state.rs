// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation state machine.
//!
//! ```text
//! idle -> collecting -> reviewing -> idle
//! idle -> searching -> selecting -> editing -> idle
//! ```
//!
//! The classifier proposes the next state; [`transition`] enforces legality
//! and the per-state invariants on the transient session fields.

use tracing::debug;
use vitrina_core::{ConversationSession, SessionState};

/// Whether `to` may follow `from`.
///
/// `reviewing` needs a draft in progress, so it is only reachable from
/// `collecting` or itself. Every other state can be entered from anywhere:
/// the operator may abandon one task for another at any time.
pub fn is_legal(from: SessionState, to: SessionState) -> bool {
    match to {
        SessionState::Reviewing => matches!(from, SessionState::Collecting | SessionState::Reviewing),
        _ => true,
    }
}

/// Moves `session` to `to`, or to the closest legal state.
///
/// - `editing` requires a selected product.
/// - `reviewing` requires a generated listing on the draft.
/// - Entering `collecting` from anything but `collecting`/`reviewing`
///   starts a fresh draft.
///
/// Returns the state actually entered.
pub fn transition(session: &mut ConversationSession, to: SessionState) -> SessionState {
    let from = session.state;
    let mut to = if is_legal(from, to) {
        to
    } else {
        debug!(%from, %to, "illegal transition ignored");
        from
    };

    if to == SessionState::Editing && session.selected_product_id.is_none() {
        debug!(%from, "editing without a selected product");
        to = if from == SessionState::Editing { SessionState::Idle } else { from };
    }
    if to == SessionState::Reviewing && session.product_data.ai_result.is_none() {
        to = if from == SessionState::Reviewing { SessionState::Collecting } else { from };
    }

    if to == SessionState::Collecting
        && !matches!(from, SessionState::Collecting | SessionState::Reviewing)
    {
        session.reset_draft();
    }

    session.state = to;
    enforce_invariants(session);
    to
}

/// Drops transient fields that have no meaning in the current state.
pub fn enforce_invariants(session: &mut ConversationSession) {
    if session.state != SessionState::Editing {
        session.selected_product_id = None;
    }
    if !matches!(session.state, SessionState::Searching | SessionState::Selecting) {
        session.search_results.clear();
    }
    if !matches!(
        session.state,
        SessionState::Searching | SessionState::Selecting | SessionState::Editing
    ) {
        session.pending_action = None;
    }
}
