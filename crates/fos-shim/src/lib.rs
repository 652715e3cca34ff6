//! fOS Filter Shim
//!
//! Lets a portable content-filtering engine run on a host that only offers
//! primitive I/O (print, toast, one-shot timeout, whole-file read/write,
//! locale). The shim builds the richer platform the engine expects:
//!
//! 1. Component registry → symbolic names to factories, with aliases
//! 2. Virtual files → path handles passing straight through to the host
//! 3. Line input / buffered output streams → whole-file reads and writes
//! 4. Repeating timers → self-rescheduling one-shot timeouts
//! 5. JSON codec → whole-value encode/decode over the streams
//! 6. Prefs and utils → version comparison, locale matching, URI schemes
//!
//! Everything is single-threaded: shared state is `Rc`/`RefCell` and the
//! host event loop is the only driver.

mod config;
mod context;
mod file;
mod host;
mod input;
mod json;
mod output;
mod prefs;
mod registry;
mod report;
mod timer;
mod timer_queue;
mod utils;

pub use config::{ConfigError, ShimConfig, DEFAULT_FALLBACK_URL};
pub use context::{ShimContext, ShimEnvironment};
pub use file::{ParentDirectory, VirtualFile};
pub use host::{Host, HostError, MemoryHost, NativeHost, TimerCallback};
pub use input::{InputSource, LineInputStream, LineRecord};
pub use json::{CodecError, JsonCodec};
pub use output::{OutputStream, OutputTarget, StreamError};
pub use prefs::Prefs;
pub use registry::{contract, Component, ComponentFactory, ComponentKind, ComponentRegistry, RegistryError};
pub use report::{report_error, CallbackError};
pub use timer::{RepeatingCallback, RepeatingTimer, TimerHandle};
pub use timer_queue::{NextRun, TimerQueue};
pub use utils::{compare_versions, locale_prefix_match, version_ordering, Uri, UriError, Utils, PLATFORM_VERSION};
