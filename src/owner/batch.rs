use std::collections::HashMap;

use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

use crate::{
    protocol::{DecryptError, DecryptedLocationReport, KeyIdentifier, PrivateKey},
    server::ReportResponse,
};

use super::OwnerDevice;

/// Decrypt every report that belongs to one of `keys`, grouped by key.
///
/// Each report is decrypted on the blocking pool by a task that owns its inputs; the join loop
/// below is the only writer of the result map. Reports for identifiers not in `keys` and
/// reports that fail to decrypt are dropped. Every key that had at least one report addressed
/// to it is present in the result, and its reports keep their order in `reports`.
///
/// Only fails if a worker panics or is cancelled.
pub async fn decrypt_reports(
    reports: Vec<ReportResponse>,
    keys: &[(KeyIdentifier, PrivateKey)],
) -> Result<HashMap<KeyIdentifier, Vec<DecryptedLocationReport>>, JoinError> {
    let keys_by_id: HashMap<String, &(KeyIdentifier, PrivateKey)> = keys
        .iter()
        .map(|pair| (pair.0.to_base64(), pair))
        .collect();

    let total = reports.len();
    let mut decrypted: HashMap<KeyIdentifier, Vec<(usize, DecryptedLocationReport)>> =
        HashMap::new();
    let mut workers = JoinSet::new();

    for (index, report) in reports.into_iter().enumerate() {
        let Some((key_id, private_key)) = keys_by_id.get(report.id.as_str()).copied() else {
            debug!(id = %report.id, "dropping report for an identifier we didn't ask for");
            continue;
        };

        decrypted.entry(*key_id).or_default();

        let key_id = *key_id;
        let private_key = private_key.clone();
        workers.spawn_blocking(move || (key_id, index, decrypt_one(&private_key, &report)));
    }

    let mut failures = 0usize;
    while let Some(joined) = workers.join_next().await {
        let (key_id, index, result) = joined?;
        match result {
            Ok(report) => decrypted.entry(key_id).or_default().push((index, report)),
            Err(error) => {
                failures += 1;
                debug!(?key_id, index, %error, "dropping report that failed to decrypt");
            }
        }
    }

    if failures > 0 {
        warn!(failures, total, "some reports could not be decrypted");
    }

    Ok(decrypted
        .into_iter()
        .map(|(key_id, mut reports)| {
            reports.sort_unstable_by_key(|(index, _)| *index);
            (key_id, reports.into_iter().map(|(_, report)| report).collect())
        })
        .collect())
}

fn decrypt_one(
    private_key: &PrivateKey,
    report: &ReportResponse,
) -> Result<DecryptedLocationReport, DecryptError> {
    let encrypted_report = report.encrypted_report()?;
    OwnerDevice().decrypt_report(private_key, &encrypted_report, report.date_published)
}
