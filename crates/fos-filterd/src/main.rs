//! fos-filterd: request classification diagnostics
//!
//! Reads proxy requests from stdin, one per line as
//! `url<TAB>referer<TAB>accept` (trailing fields optional), and prints the
//! matcher input each one produces as JSON. A summary report is written to
//! the data directory through the shim's own file components.

use anyhow::{Context, Result};
use fos_filter::{
    ClassificationRequest, ClassifierConfig, ContentType, ReferrerMapping, RequestClassifier, RequestError,
    TrailingLabels,
};
use fos_shim::{contract, report_error, CallbackError, NativeHost, ShimConfig, ShimEnvironment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Summary file written next to the filter data.
const REPORT_FILE: &str = "filterd-report.json";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DaemonConfig {
    shim: ShimConfig,
    classifier: ClassifierConfig,
}

impl DaemonConfig {
    fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        let config: Self =
            serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[derive(Debug, Serialize)]
struct Verdict {
    url: String,
    content_type: ContentType,
    third_party: bool,
    referrer_chain: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
struct Report {
    requests: usize,
    invalid: usize,
    third_party: usize,
    by_type: BTreeMap<String, usize>,
}

struct Session {
    classifier: RequestClassifier,
    referrers: ReferrerMapping,
    report: Report,
}

impl Session {
    fn new(config: ClassifierConfig) -> Self {
        Self {
            classifier: RequestClassifier::new(config, Rc::new(TrailingLabels::default())),
            referrers: ReferrerMapping::new(),
            report: Report::default(),
        }
    }

    /// Classify one input line; blank lines and `#` comments yield nothing.
    fn classify_line(&mut self, line: &str) -> Result<Option<Verdict>, RequestError> {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let mut fields = line.split('\t');
        let url = fields.next().unwrap_or_default();
        let referer = fields.next().filter(|f| !f.is_empty());
        let accept = fields.next().filter(|f| !f.is_empty());

        let request = match ClassificationRequest::from_headers(url, referer, accept) {
            Ok(request) => request,
            Err(e) => {
                self.report.invalid += 1;
                return Err(e);
            }
        };
        if let Some(referer) = referer {
            self.referrers.add(url, referer);
        }

        let classification = self.classifier.classify(&request);
        self.report.requests += 1;
        if classification.third_party {
            self.report.third_party += 1;
        }
        *self
            .report
            .by_type
            .entry(classification.content_type.to_string())
            .or_default() += 1;

        Ok(Some(Verdict {
            referrer_chain: self.referrers.build_referrer_chain(url),
            url: classification.url,
            content_type: classification.content_type,
            third_party: classification.third_party,
        }))
    }
}

/// Write `report` as JSON into the data directory.
fn write_report(env: &ShimEnvironment, report: &Report) -> Result<()> {
    let mut file = env.utils().resolve_file_path(&env.prefs().data_directory());
    file.append(REPORT_FILE);

    let mut stream = env
        .create_instance(contract::SAFE_FILE_OUTPUT_STREAM)?
        .into_output_stream()?;
    stream.init(&file);
    let codec = env.create_instance(contract::JSON)?.into_json()?;

    codec.encode_to_stream(&stream, report)?;
    stream.close()?;
    info!("Report written to {}", file);
    Ok(())
}

async fn run(config: DaemonConfig) -> Result<()> {
    let host = Rc::new(NativeHost::new(&config.shim));
    let timers = host.timers();
    let env = Rc::new(ShimEnvironment::new(host, config.shim)?);

    info!(
        "fos-filterd {} starting (locale {}, autoupdate {})",
        env.utils().addon_version(),
        env.utils().app_locale(),
        env.prefs().subscriptions_autoupdate()
    );

    let mut session = Session::new(config.classifier);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in io::stdin().lock().lines() {
        let line = line.context("reading stdin")?;
        match session.classify_line(&line) {
            Ok(Some(verdict)) => {
                serde_json::to_writer(&mut out, &verdict)?;
                writeln!(out)?;
            }
            Ok(None) => {}
            Err(e) => warn!("Skipping request: {}", e),
        }
    }
    out.flush()?;

    let report = session.report;
    info!("Classified {} requests ({} invalid)", report.requests, report.invalid);

    // Written from the event loop, like every other engine-side I/O
    let report_env = env.clone();
    env.utils().run_async(move || {
        if let Err(e) = write_report(&report_env, &report) {
            report_error(report_env.context().host().as_ref(), &CallbackError::from(e));
        }
    });

    let ran = timers.run_until_idle().await;
    debug!("Event loop drained after {} callbacks", ran);

    info!("fos-filterd shutting down");
    Ok(())
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = DaemonConfig::load(config_path.as_deref())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("building event loop")?;
    runtime.block_on(run(config))
}
