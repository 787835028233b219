//! services/api/src/bin/hash_secret.rs
//!
//! Prints the argon2 hash of a password or access code, for use in the allow-list
//! file. The secret is taken from the first argument, or read from stdin.

use api_lib::adapters::allow_list::hash_secret;
use std::io::BufRead;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let secret = match std::env::args().nth(1) {
        Some(secret) => secret,
        None => {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            line
        }
    };
    let secret = secret.trim();
    if secret.is_empty() {
        return Err("no secret given".into());
    }
    let hash = hash_secret(secret).map_err(|e| e.to_string())?;
    println!("{hash}");
    Ok(())
}
