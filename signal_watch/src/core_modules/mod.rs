pub mod color_classifier;
pub mod event_sink;
pub mod pixel;
pub mod region;
pub mod region_editor;
pub mod region_store;
pub mod shape_detector;
pub mod sqlite_sink;
pub mod transition_gate;
