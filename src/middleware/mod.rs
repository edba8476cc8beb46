pub mod request_tracker;
