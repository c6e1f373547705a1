//! Built-in board descriptions

use crate::error::CliError;
use dapflash_core::target::{BoardDatabase, BoardInfo};
use once_cell::sync::Lazy;
use std::path::Path;

/// RON descriptions shipped with the binary
const BUILTIN: &[(&str, &str)] = &[
    ("microbit_v1.ron", include_str!("../boards/microbit_v1.ron")),
    ("microbit_v2.ron", include_str!("../boards/microbit_v2.ron")),
    ("frdm_k64f.ron", include_str!("../boards/frdm_k64f.ron")),
    ("nrf5340_dk.ron", include_str!("../boards/nrf5340_dk.ron")),
];

/// Database of the built-in boards, parsed on first use
pub static BUILTIN_BOARDS: Lazy<BoardDatabase> = Lazy::new(|| {
    let mut db = BoardDatabase::new();
    for (file, content) in BUILTIN {
        if let Err(e) = db.load_ron(content) {
            log::error!("Built-in board {} is invalid: {}", file, e);
        }
    }
    db
});

/// Build the board database: the built-in boards plus `extra` files or
/// directories
pub fn load_board_database(extra: &[impl AsRef<Path>]) -> Result<BoardDatabase, CliError> {
    let mut db = BUILTIN_BOARDS.clone();

    for path in extra {
        let path = path.as_ref();
        if path.is_dir() {
            let count = db.load_dir(path)?;
            log::debug!("Loaded {} boards from {}", count, path.display());
        } else if path.is_file() {
            let board = db.load_file(path)?;
            log::debug!("Loaded board {} from {}", board.name, path.display());
        } else {
            return Err(CliError::BoardFileNotFound(path.to_path_buf()));
        }
    }

    Ok(db)
}

/// Look up a board by ID, name or part number
pub fn find_board<'a>(db: &'a BoardDatabase, key: &str) -> Result<&'a BoardInfo, CliError> {
    db.find(key)
        .ok_or_else(|| CliError::UnknownBoard(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_boards_load() {
        assert_eq!(BUILTIN_BOARDS.len(), BUILTIN.len());
        for id in ["9900", "9904", "0240", "1102"] {
            assert!(BUILTIN_BOARDS.find_by_id(id).is_some(), "missing {}", id);
        }
    }

    #[test]
    fn test_find_board() {
        let db = load_board_database(&[] as &[&Path]).unwrap();
        assert_eq!(find_board(&db, "9904").unwrap().board_id, "9904");
        assert!(matches!(
            find_board(&db, "no-such-board"),
            Err(CliError::UnknownBoard(_))
        ));
    }

    #[test]
    fn test_missing_board_file() {
        let result = load_board_database(&[Path::new("/nonexistent/board.ron")]);
        assert!(matches!(result, Err(CliError::BoardFileNotFound(_))));
    }
}
