// Domain layer: flat records exchanged with the cloud APIs and the ports the core depends on.

pub mod model;
pub mod ports;
