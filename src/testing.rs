//! Fresh in-memory database with every module's schema applied.

use estante_db::Database;
use estante_kernel::settings::DatabaseSettings;

use crate::modules::{accounts, catalog, collections};

pub async fn database() -> Database {
    let db = Database::connect(&DatabaseSettings::in_memory())
        .await
        .expect("in-memory database");
    let mut migrations = Vec::new();
    for (module, owned) in [
        ("accounts", accounts::migrations()),
        ("catalog", catalog::migrations()),
        ("collections", collections::migrations()),
    ] {
        migrations.extend(owned.into_iter().map(|m| (module.to_string(), m)));
    }
    db.migrate(&migrations).await.expect("schema applies");
    db
}
