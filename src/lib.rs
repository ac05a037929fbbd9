//! Abuse-prevention gateway for a procurement marketplace client.
//!
//! The marketplace itself is CRUD screens over a managed backend; this crate
//! is the one subsystem with real state over time. It composes a
//! sliding-window rate limiter with attack-pattern detection, a session
//! lifecycle manager, and a pattern-based threat scanner into a secure
//! request gateway around outbound calls.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────┐
//!                 │              SECURE GATEWAY                  │
//!                 │                                              │
//!  Outbound call  │  ┌───────────┐  ┌─────────┐  ┌────────────┐ │
//!  ───────────────┼─▶│rate_limit │─▶│ scanner │─▶│  session   │ │
//!                 │  └───────────┘  └─────────┘  └─────┬──────┘ │
//!                 │                                     ▼        │
//!                 │                 ┌─────────┐  ┌────────────┐ │
//!  Response       │                 │  csrf + │  │  dispatch  │ │
//!  ◀──────────────┼─────────────────│ headers │◀─┤ (reqwest)  │ │
//!                 │                 └─────────┘  └────────────┘ │
//!                 │                                              │
//!                 │  ┌────────────────────────────────────────┐ │
//!                 │  │          Cross-Cutting Concerns        │ │
//!                 │  │  ┌────────┐ ┌─────────────┐ ┌────────┐ │ │
//!                 │  │  │ config │ │observability│ │lifecycle│ │ │
//!                 │  │  └────────┘ └─────────────┘ └────────┘ │ │
//!                 │  └────────────────────────────────────────┘ │
//!                 └──────────────────────────────────────────────┘
//! ```
//!
//! State is process-local and single-instance by design; a multi-instance
//! deployment needs a shared store behind `security::store::RecordStore`.

// Core subsystems
pub mod config;
pub mod error;
pub mod gateway;
pub mod security;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::{load_config, GatewayConfig};
pub use error::{GatewayError, GatewayResult};
pub use gateway::{GatewayResponse, OutboundRequest, RequestBody, SecureGateway};
pub use lifecycle::{Shutdown, Sweeper};
pub use observability::audit::AuditLog;
pub use security::rate_limit::{OperationClass, RateLimitDecision, RateLimiter};
pub use security::scanner::{RiskLevel, ScanContext, ThreatAssessment, ThreatScanner};
pub use security::session::{Session, SessionCheck, SessionManager, SessionMetadata};
