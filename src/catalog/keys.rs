//! Key construction helpers for catalog rows.
//!
//! Every catalog row lives under one of four reserved prefixes inside the
//! same B+-tree user rows live in: `__catalog__tables:`,
//! `__catalog__columns:`, `__catalog__indexes:`, `__catalog__stats:`. No
//! user-facing identifier may begin with `__catalog__`; this is enforced
//! by [`super::reject_reserved_name`], checked by every catalog entry
//! point that accepts a name coming from SQL (`create_table`,
//! `add_column`, `create_index`), so these never collide with row keys.

pub fn table_key(table: &str) -> Vec<u8> {
    format!("__catalog__tables:{table}").into_bytes()
}

pub fn column_key(table: &str, column: &str) -> Vec<u8> {
    format!("__catalog__columns:{table}:{column}").into_bytes()
}

pub fn index_key(index_name: &str) -> Vec<u8> {
    format!("__catalog__indexes:{index_name}").into_bytes()
}

pub fn stats_key(table: &str) -> Vec<u8> {
    format!("__catalog__stats:{table}").into_bytes()
}

/// Lower/upper bounds covering every key beginning with `prefix`. The
/// upper bound appends a single `0xFF` byte, which compares greater than
/// any continuation built from ordinary identifier characters.
pub fn prefix_range(prefix: &str) -> (Vec<u8>, Vec<u8>) {
    let lo = prefix.as_bytes().to_vec();
    let mut hi = lo.clone();
    hi.push(0xFF);
    (lo, hi)
}
