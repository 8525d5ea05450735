//! Photo Map Organizer API server binary.
//!
//! All wiring lives in the `photomap` library crate; this binary only
//! hands control to [`photomap::run`].

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    photomap::run().await
}
