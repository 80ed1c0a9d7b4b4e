use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::RwLock;

/// Expected capacity and false-positive rate.
const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

static USERNAME_FILTER: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

#[inline]
pub fn normalize(username: &str) -> String {
    username.trim().to_lowercase()
}

/// false => username is certainly free; true => ask the database
pub fn might_exist(username: &str) -> bool {
    let username = normalize(username);
    match USERNAME_FILTER.read() {
        Ok(filter) => filter.contains(&username),
        // poisoned: fall back to the database check
        Err(_) => true,
    }
}

pub fn insert(username: &str) {
    let username = normalize(username);
    let mut filter = USERNAME_FILTER.write().unwrap_or_else(|p| p.into_inner());
    filter.add(&username);
}

/// Streams every username into the filter in batches.
pub async fn warmup_username_filter(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String,)>("SELECT username FROM users").fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (username,) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;

        batch.push(normalize(&username));
        total += 1;

        if batch.len() == batch_size {
            insert_batch(&batch);
            batch.clear();
        }
    }

    if !batch.is_empty() {
        insert_batch(&batch);
    }

    tracing::info!(total, "Username filter warmup complete");
    Ok(())
}

fn insert_batch(usernames: &[String]) {
    let mut filter = USERNAME_FILTER.write().unwrap_or_else(|p| p.into_inner());

    for username in usernames {
        filter.add(username);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserted_names_are_found_case_insensitively() {
        insert("Registrar.Office");
        assert!(might_exist("registrar.office"));
        assert!(might_exist("  REGISTRAR.OFFICE "));
    }

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize("  Dr.Khan "), "dr.khan");
    }
}
