// Domain layer: the transformation config aggregate, its wire form and the ports
// (interfaces) to the outside world. No I/O here.

pub mod model;
pub mod ports;
pub mod wire;
