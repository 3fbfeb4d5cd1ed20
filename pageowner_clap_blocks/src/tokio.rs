//! Config for the tokio runtime the command line tools run on.

use std::{
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

/// Tokio runtime type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TokioRuntimeType {
    /// Current-thread runtime.
    #[default]
    CurrentThread,

    /// Multi-thread runtime.
    MultiThread,
}

/// CLI config for the tokio runtime.
#[derive(Debug, Clone, Copy, clap::Parser)]
pub struct TokioRuntimeConfig {
    /// Tokio runtime type.
    ///
    /// A migration issues one request at a time, so a single thread is enough.
    #[clap(
        id = "runtime_type",
        long = "runtime-type",
        env = "PAGEOWNER_RUNTIME_TYPE",
        default_value_t = TokioRuntimeType::default(),
        value_enum,
        action
    )]
    pub runtime_type: TokioRuntimeType,

    /// Set the maximum number of worker threads of a multi-thread runtime.
    ///
    /// Defaults to the number of logical cores on the system.
    #[clap(
        id = "runtime_num_threads",
        long = "num-threads",
        env = "PAGEOWNER_NUM_THREADS",
        action
    )]
    pub num_threads: Option<NonZeroUsize>,

    /// Sets a custom timeout for a thread in the blocking pool of the runtime.
    #[clap(
        id = "runtime_thread_keep_alive",
        long = "runtime-thread-keep-alive",
        env = "PAGEOWNER_RUNTIME_THREAD_KEEP_ALIVE",
        value_parser = humantime::parse_duration
    )]
    pub thread_keep_alive: Option<Duration>,
}

impl TokioRuntimeConfig {
    /// Creates the tokio runtime builder.
    pub fn builder(&self) -> Result<::tokio::runtime::Builder, std::io::Error> {
        // NOTE: no log macros will work here, the subscriber is installed after the runtime
        // starts. Use eprintln!() instead.

        let mut builder = match self.runtime_type {
            TokioRuntimeType::CurrentThread => ::tokio::runtime::Builder::new_current_thread(),
            TokioRuntimeType::MultiThread => {
                let mut builder = ::tokio::runtime::Builder::new_multi_thread();
                let num_threads = match self.num_threads {
                    None => std::thread::available_parallelism()?,
                    Some(n) => n,
                };
                builder.worker_threads(num_threads.get());
                builder
            }
        };

        builder.enable_time();
        builder.enable_io();

        let thread_counter = Arc::new(AtomicUsize::new(1));
        builder.thread_name_fn(move || {
            format!(
                "pageowner tokio {}",
                thread_counter.fetch_add(1, Ordering::SeqCst)
            )
        });

        if let Some(x) = self.thread_keep_alive {
            builder.thread_keep_alive(x);
        }

        Ok(builder)
    }
}
