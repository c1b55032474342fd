//! # Task Server Library
//!
//! This crate provides a team task-management server with:
//! - RESTful HTTP API endpoints for teams, projects, tasks and their content
//! - WebSocket gateway for room-scoped real-time events and presence
//! - PostgreSQL (or in-memory) persistence
//! - Redis-backed job queue for notification delivery and maintenance
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Core business entities, access policy and repository traits
//! - **Application Layer**: Business logic services, DTOs and background jobs
//! - **Infrastructure Layer**: Database, queue, storage and metrics implementations
//! - **Presentation Layer**: HTTP handlers, middleware and WebSocket gateway
//!
//! ## Module Structure
//!
//! ```text
//! task_server/
//! +-- config/         Configuration management
//! +-- domain/         Domain entities, value objects, and traits
//! +-- application/    Application services, DTOs and jobs
//! +-- infrastructure/ Database, queue and storage implementations
//! +-- presentation/   HTTP routes and WebSocket handlers
//! +-- shared/         Common utilities (errors, snowflake IDs, pagination)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
