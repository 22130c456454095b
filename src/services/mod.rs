/// Question catalog import and lookup.
pub mod catalog_service;
/// Controller judgments coming from WebSocket or REST.
pub mod controller_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Presenter commands driving the session through its phases.
pub mod presenter_service;
/// Public service for read-only session information.
pub mod public_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service and presenter lease handling.
pub mod sse_service;
/// Storage connection supervisor with reconnect backoff.
pub mod storage_supervisor;
/// Countdown driven by the presenter lease holder.
pub mod timer_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
