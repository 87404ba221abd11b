//! Decrypt-then-stage-then-view pipeline for a single CSV file (spec §4.3).

use common::error::IngestError;
use common::type_map::duckdb_type_name;
use common::types::{ColumnType, IngestProps};
use duckdb::Connection;
use logging::Logger;
use memfile::MemFile;
use sqlgen::quote_ident;
use std::io::Read;
use warehouse::StagingCatalog;

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    None,
    Zstd,
}

impl Compression {
    fn as_sql_literal(self) -> &'static str {
        match self {
            Compression::None => "'none'",
            Compression::Zstd => "'zstd'",
        }
    }
}

pub struct CsvIngest;

impl CsvIngest {
    /// Stages `props.filename` as an ephemeral view and hands its fully
    /// qualified name to `f`. The ephemeral catalog is detached on every
    /// exit path, including when `f` returns an error (spec §4.3, §4.4).
    ///
    /// `all_varchar_eligible` is set by the caller: true for update batches
    /// and sentinel-enabled replace batches, false otherwise (spec §4.3
    /// step 5's type policy).
    #[track_caller]
    pub fn with_staged_view<T>(
        con: &Connection,
        logger: &Logger,
        props: &IngestProps,
        all_varchar_eligible: bool,
        f: impl FnOnce(&str) -> Result<T, IngestError>,
    ) -> Result<T, IngestError> {
        let metadata = std::fs::metadata(&props.filename).map_err(|_| {
            IngestError::invalid_argument(format!("File not found or not readable: {}", props.filename))
        })?;

        // Held alive for the duration of the staged view so the `/dev/fd`
        // path keeps resolving; dropped (and reclaimed) once we return.
        let _mem_guard;
        let effective_path = if let Some(key) = props.decryption_key.as_deref().filter(|k| !k.is_empty()) {
            // Sized to the ciphertext length up front so the decryptor can
            // stream into it; plaintext is always shorter (IV + padding are
            // stripped), so the file is shrunk to the actual byte count
            // afterward to avoid staging a zero-filled tail as CSV data.
            let mem = MemFile::create(metadata.len())?;
            let written = {
                let mut out = std::fs::OpenOptions::new()
                    .write(true)
                    .open(mem.path())
                    .map_err(|err| IngestError::io_with_source(format!("Failed to open memfile {}", mem.path()), err))?;
                crypto::Decryptor::decrypt_file(&props.filename, &mut out, key)?
            };
            mem.set_len(written)?;
            let path = mem.path().to_string();
            _mem_guard = Some(mem);
            path
        } else {
            _mem_guard = None;
            props.filename.clone()
        };

        let compression = sniff_compression(&effective_path)?;

        let catalog = StagingCatalog::attach(con, logger)?;
        let view_name = format!(
            "{}.{}.{}",
            quote_ident(&catalog.name),
            quote_ident("main"),
            quote_ident("csv_view")
        );

        let outcome = (|| -> Result<T, IngestError> {
            let create_view_sql = build_create_view_sql(&catalog.name, &effective_path, compression, props, all_varchar_eligible);
            tracing::info!(sql = %create_view_sql, "create_view");
            con.execute(&create_view_sql, []).map_err(|err| {
                IngestError::warehouse(format!("Failed to stage {} as a view: {err}", props.filename))
            })?;
            f(&view_name)
        })();

        drop(catalog);
        outcome
    }
}

fn sniff_compression(path: &str) -> Result<Compression, IngestError> {
    let mut file = std::fs::File::open(path)
        .map_err(|err| IngestError::io_with_source(format!("Failed to open {path} for compression sniff"), err))?;
    let mut header = [0u8; 4];
    let n = file
        .read(&mut header)
        .map_err(|err| IngestError::io_with_source(format!("Failed to read {path} for compression sniff"), err))?;
    if n == 4 && header == ZSTD_MAGIC {
        Ok(Compression::Zstd)
    } else {
        Ok(Compression::None)
    }
}

fn build_create_view_sql(
    catalog_name: &str,
    effective_path: &str,
    compression: Compression,
    props: &IngestProps,
    all_varchar_eligible: bool,
) -> String {
    let view_name = format!("{}.{}.{}", quote_ident(catalog_name), quote_ident("main"), quote_ident("csv_view"));

    let mut options = vec![
        "delim=','".to_string(),
        "header=true".to_string(),
        "escape='\"'".to_string(),
        "quote='\"'".to_string(),
        "new_line='\\n'".to_string(),
        "encoding='utf-8'".to_string(),
        format!("compression={}", compression.as_sql_literal()),
    ];
    if let Some(nullstr) = props.null_value.as_deref().filter(|s| !s.is_empty()) {
        options.push(format!("nullstr={}", sqlgen::quote_literal(nullstr)));
    }

    let has_unspecified = props.columns.iter().any(|c| c.column_type == ColumnType::Unspecified);
    if has_unspecified {
        options.push("auto_detect=true".to_string());
    } else if all_varchar_eligible {
        options.push("all_varchar=true".to_string());
    } else {
        let mapping = props
            .columns
            .iter()
            .map(|c| format!("{}: '{}'", sqlgen::quote_literal(&c.name), duckdb_type_name(c.column_type, c.precision, c.scale)))
            .collect::<Vec<_>>()
            .join(", ");
        options.push(format!("column_types={{{mapping}}}"));
        options.push("auto_detect=true".to_string());
    }

    let projection = props.columns.iter().map(|c| quote_ident(&c.name)).collect::<Vec<_>>().join(", ");
    let options_sql = options.join(", ");

    format!(
        "CREATE VIEW {view_name} AS SELECT {projection} FROM read_csv({}, {options_sql})",
        sqlgen::quote_literal(effective_path)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::ColumnDef;

    fn props(columns: Vec<ColumnDef>) -> IngestProps {
        IngestProps::new("books.csv", columns)
    }

    #[test]
    fn unspecified_column_forces_auto_detect_without_column_types() {
        let p = props(vec![ColumnDef::new("id", ColumnType::Unspecified)]);
        let sql = build_create_view_sql("temp_mem_db_1", "books.csv", Compression::None, &p, false);
        assert!(sql.contains("auto_detect=true"));
        assert!(!sql.contains("column_types="));
        assert!(!sql.contains("all_varchar=true"));
    }

    #[test]
    fn sentinel_eligible_batch_uses_all_varchar() {
        let p = props(vec![ColumnDef::new("id", ColumnType::Int)]);
        let sql = build_create_view_sql("temp_mem_db_1", "books.csv", Compression::None, &p, true);
        assert!(sql.contains("all_varchar=true"));
        assert!(!sql.contains("column_types="));
    }

    #[test]
    fn non_sentinel_batch_emits_explicit_column_types() {
        let p = props(vec![ColumnDef::new("id", ColumnType::Int), ColumnDef::new("title", ColumnType::String)]);
        let sql = build_create_view_sql("temp_mem_db_1", "books.csv", Compression::None, &p, false);
        assert!(sql.contains("column_types={'id': 'INTEGER', 'title': 'VARCHAR'}"));
        assert!(sql.contains("auto_detect=true"));
    }

    #[test]
    fn projection_pins_column_order() {
        let p = props(vec![ColumnDef::new("b", ColumnType::Int), ColumnDef::new("a", ColumnType::Int)]);
        let sql = build_create_view_sql("temp_mem_db_1", "books.csv", Compression::None, &p, false);
        assert!(sql.contains(r#"SELECT "b", "a" FROM"#));
    }

    #[test]
    fn nullstr_option_only_emitted_when_configured() {
        let mut p = props(vec![ColumnDef::new("id", ColumnType::Int)]);
        p.null_value = Some("\\N".to_string());
        let sql = build_create_view_sql("temp_mem_db_1", "books.csv", Compression::None, &p, false);
        assert!(sql.contains("nullstr='\\N'"));
    }

    #[test]
    fn zstd_magic_bytes_are_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv.zst");
        std::fs::write(&path, [0x28, 0xB5, 0x2F, 0xFD, 0x00, 0x01]).unwrap();
        assert_eq!(sniff_compression(path.to_str().unwrap()).unwrap(), Compression::Zstd);
    }

    #[test]
    fn plain_csv_is_uncompressed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, b"id,title\n1,hello\n").unwrap();
        assert_eq!(sniff_compression(path.to_str().unwrap()).unwrap(), Compression::None);
    }

    /// The memfile the decrypted plaintext lands in is sized to the
    /// *ciphertext* length up front; if it isn't shrunk back down after
    /// decryption, `read_csv` sees the zero-filled tail past the IV and
    /// PKCS#7 padding as part of the file and either errors out or produces
    /// a bogus trailing row.
    #[test]
    fn encrypted_file_is_staged_without_a_zero_filled_tail() {
        use ::cipher::{generic_array::GenericArray, BlockEncryptMut, KeyIvInit};
        use rand::RngCore;

        let key = [0u8; crypto::KEY_SIZE];
        let csv = b"id,title\n1,hello\n2,world\n".to_vec();

        let mut iv = [0u8; crypto::BLOCK_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);
        let pad_len = crypto::BLOCK_SIZE - (csv.len() % crypto::BLOCK_SIZE);
        let mut padded = csv.clone();
        padded.extend(std::iter::repeat(pad_len as u8).take(pad_len));

        let mut encryptor = cbc::Encryptor::<aes::Aes256>::new((&key).into(), &iv.into());
        for chunk in padded.chunks_exact_mut(crypto::BLOCK_SIZE) {
            encryptor.encrypt_block_mut(GenericArray::from_mut_slice(chunk));
        }

        let mut ciphertext = iv.to_vec();
        ciphertext.extend(padded);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv.enc");
        std::fs::write(&path, &ciphertext).unwrap();

        let con = duckdb::Connection::open_in_memory().unwrap();
        let logger = logging::Logger::new(None);

        let mut props = props(vec![ColumnDef::new("id", ColumnType::Int), ColumnDef::new("title", ColumnType::String)]);
        props.filename = path.to_str().unwrap().to_string();
        props.decryption_key = Some(key.to_vec());

        let row_count: i64 = CsvIngest::with_staged_view(&con, &logger, &props, false, |view| {
            con.query_row(&format!("SELECT count(*) FROM {view}"), [], |row| row.get(0))
                .map_err(|err| IngestError::warehouse(err.to_string()))
        })
        .unwrap();

        assert_eq!(row_count, 2);
    }
}
