//! Application Layer
//!
//! Contains business logic services, data transfer objects (DTOs), the
//! background job system and the seams to real-time delivery and file
//! storage. This layer orchestrates the flow of data between the
//! presentation and domain layers.

pub mod dto;
pub mod jobs;
pub mod realtime;
pub mod services;
pub mod storage;
