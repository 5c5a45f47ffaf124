//! HTTP download of persisted files.

use std::io::{self, Read};
use std::time::Duration;

use crate::config::FetchSettings;
use crate::error::{PersistError, PersistResult};

/// GETs `url` and returns the body, refusing bodies over `settings.max_bytes`.
pub(crate) fn get(url: &str, settings: &FetchSettings) -> PersistResult<Vec<u8>> {
    let agent = ureq::AgentBuilder::new()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build();
    let response = match agent.get(url).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(code, _)) => {
            return Err(PersistError::io(
                format!("fetch {url}"),
                io::Error::other(format!("http status {code}")),
            ))
        }
        Err(ureq::Error::Transport(transport)) => {
            return Err(PersistError::io(
                format!("fetch {url}"),
                io::Error::other(transport.to_string()),
            ))
        }
    };

    let limit = settings.max_bytes;
    if let Some(declared) = response
        .header("content-length")
        .and_then(|value| value.trim().parse::<u64>().ok())
    {
        if declared > limit {
            return Err(PersistError::ResourceLimit(format!(
                "{url} declares {declared} bytes, limit is {limit}"
            )));
        }
    }

    let mut body = Vec::new();
    response
        .into_reader()
        .take(limit.saturating_add(1))
        .read_to_end(&mut body)
        .map_err(|err| PersistError::io(format!("read body of {url}"), err))?;
    if body.len() as u64 > limit {
        return Err(PersistError::ResourceLimit(format!(
            "{url} returned more than {limit} bytes"
        )));
    }
    Ok(body)
}
