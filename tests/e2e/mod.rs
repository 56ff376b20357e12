// End-to-end tests for the SpeechBatch Backend API
//
// Every test starts the full router on an ephemeral port, backed by a
// scripted in-process speech API so no network calls leave the machine.
//
// Architecture:
// - `TestContext` uses the in-memory session store
// - `PgTestContext` swaps in the Postgres store, leasing an isolated
//   database (test_db_<uuid>) from one shared testcontainers instance
// - Databases are truncated and recycled after each test

mod test_credentials;
mod test_health;
mod test_sessions;
mod test_synthesis;
