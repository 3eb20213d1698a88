// Converters module
// Turns carrier API data into Slack messages

pub mod carrier_to_slack;
