// Domain records: pits, devices and their statuses
pub mod entity;

// Sensor readings
pub mod reading;

// Alarm records and the per-tick alarm gate
pub mod alarm;

// Random walk, status rules and the tick driver
pub mod simulation;

// Last-known snapshots per entity
pub mod cache;

// Persistence
pub mod store;

// Dashboard read models
pub mod dashboard;

// Configuration
pub mod config;

// HTTP and WebSocket APIs
pub mod api;

// Real-time fan-out
pub mod subscription;
