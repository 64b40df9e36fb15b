mod graph_error;
mod transport_error;

pub use graph_error::GraphError;
pub use transport_error::TransportError;
