// Data models for the carrier API and Slack payloads

pub mod carrier;
pub mod slack;
