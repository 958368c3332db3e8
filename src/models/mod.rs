pub mod provider;
pub mod request;
pub mod waypoint;
