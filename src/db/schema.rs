use rusqlite::Connection;

pub fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tags (
            address    TEXT PRIMARY KEY,
            label      TEXT NOT NULL,
            category   TEXT NOT NULL,
            notes      TEXT NOT NULL DEFAULT '',
            updated_at TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}
