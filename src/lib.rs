//! Two-party call signaling: a WebSocket rendezvous relay plus the
//! client-side negotiation state machine that exchanges offers, answers,
//! and connectivity candidates through it.

pub mod call;
pub mod relay;
