pub mod contact_tracker;
pub mod dispatch_gate;
pub mod gesture_classifier;
pub mod gesture_pipeline;
pub mod handler_invoker;
pub mod trackpad_listener;

pub use contact_tracker::ContactTracker;
pub use dispatch_gate::DispatchGate;
pub use gesture_classifier::GestureClassifier;
pub use gesture_pipeline::GesturePipeline;
pub use handler_invoker::HandlerInvoker;
pub use trackpad_listener::create_trackpad_listener;
