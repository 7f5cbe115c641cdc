pub mod inactivity_events;
