//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter        | Implements    | Connects to                         |
//! |----------------|---------------|-------------------------------------|
//! | `blocking_bus` | TransferPort  | embedded-hal I2c, inline completion |
//! | `threaded_bus` | TransferPort  | embedded-hal I2c on a worker thread |
//! | `time`         | TimerPort     | std::time / detached threads        |
//! | `log_sink`     | EventSink     | `log` facade                        |
//! | `sim_tc74`     | I2c (device)  | in-memory TC74 model                |

pub mod blocking_bus;
pub mod i2c_op;
pub mod log_sink;
pub mod sim_tc74;
pub mod threaded_bus;
pub mod time;
