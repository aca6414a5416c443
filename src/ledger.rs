//! Serial counter and issued-certificate database.
//!
//! Both files use the formats of `openssl ca`: `serial` holds the next serial
//! in hex, `index.txt` has one tab-separated line per issued certificate, and
//! every certificate is copied to `newcerts/<SERIAL>.pem`.

use std::fs::{self, OpenOptions};
use std::io::Write;

use time::OffsetDateTime;
use time::macros::format_description;
use tracing::debug;

use crate::cert::Certificate;
use crate::error::{CaError, Result};
use crate::layout::CaLayout;

/// First serial handed out by a new CA.
pub const FIRST_SERIAL: u128 = 1;

/// One line of `index.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// `V` for valid, `R` revoked, `E` expired.
    pub status: char,
    pub expires: String,
    pub serial: String,
    pub subject: String,
}

impl LedgerEntry {
    pub fn for_certificate(cert: &Certificate) -> Result<Self> {
        Ok(Self {
            status: 'V',
            expires: index_time(cert.validity().not_after)?,
            serial: cert.serial_hex(),
            subject: cert.subject().to_slash_form(),
        })
    }

    fn to_line(&self) -> String {
        format!(
            "{}\t{}\t\t{}\tunknown\t{}",
            self.status, self.expires, self.serial, self.subject
        )
    }

    fn parse(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split('\t').collect();
        match fields.as_slice() {
            [status, expires, _revoked, serial, _file, subject] => Some(Self {
                status: status.chars().next()?,
                expires: expires.to_string(),
                serial: serial.to_string(),
                subject: subject.to_string(),
            }),
            _ => None,
        }
    }
}

/// Access to the bookkeeping files of one CA.
pub struct Ledger<'a> {
    layout: &'a CaLayout,
}

impl<'a> Ledger<'a> {
    pub fn new(layout: &'a CaLayout) -> Self {
        Self { layout }
    }

    /// Writes an empty database and the first serial.
    pub fn initialize(&self) -> Result<()> {
        let index = self.layout.index_file();
        fs::write(&index, "").map_err(CaError::io(&index))?;
        let serial = self.layout.serial_file();
        fs::write(&serial, format!("{}\n", format_serial(FIRST_SERIAL)))
            .map_err(CaError::io(&serial))?;
        Ok(())
    }

    /// The serial the next certificate will carry.
    pub fn next_serial(&self) -> Result<u128> {
        let path = self.layout.serial_file();
        let text = fs::read_to_string(&path).map_err(CaError::io(&path))?;
        u128::from_str_radix(text.trim(), 16).map_err(|e| CaError::ConfigError {
            path,
            message: format!("malformed serial {:?}: {e}", text.trim()),
        })
    }

    /// Stores `used + 1` as the next serial.
    pub fn advance(&self, used: u128) -> Result<()> {
        let next = used
            .checked_add(1)
            .ok_or_else(|| CaError::CertificateError("serial number space exhausted".into()))?;
        let path = self.layout.serial_file();
        fs::write(&path, format!("{}\n", format_serial(next))).map_err(CaError::io(&path))?;
        debug!(serial = %format_serial(next), "next serial");
        Ok(())
    }

    /// Appends `cert` to the database and copies it to `newcerts/`.
    pub fn record(&self, cert: &Certificate) -> Result<()> {
        let entry = LedgerEntry::for_certificate(cert)?;

        let index = self.layout.index_file();
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&index)
            .map_err(CaError::io(&index))?;
        writeln!(file, "{}", entry.to_line()).map_err(CaError::io(&index))?;

        let copy = self.layout.newcert_path(&entry.serial);
        fs::write(&copy, cert.to_pem()?).map_err(CaError::io(&copy))?;
        debug!(serial = %entry.serial, subject = %entry.subject, "recorded in ledger");
        Ok(())
    }

    /// Lines of `index.txt`, skipping any that do not parse.
    pub fn entries(&self) -> Result<Vec<LedgerEntry>> {
        let path = self.layout.index_file();
        let text = fs::read_to_string(&path).map_err(CaError::io(&path))?;
        Ok(text.lines().filter_map(LedgerEntry::parse).collect())
    }
}

/// Upper-case hex with an even number of digits, at least two.
pub fn format_serial(serial: u128) -> String {
    let hex = format!("{serial:X}");
    if hex.len() % 2 == 1 {
        format!("0{hex}")
    } else {
        hex
    }
}

/// Minimal big-endian bytes of a serial.
pub fn serial_bytes(serial: u128) -> Vec<u8> {
    let bytes = serial.to_be_bytes();
    let first = bytes
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(bytes.len() - 1);
    bytes[first..].to_vec()
}

/// `YYMMDDHHMMSSZ` through 2049, `YYYYMMDDHHMMSSZ` afterwards.
fn index_time(at: OffsetDateTime) -> Result<String> {
    let formatted = if at.year() < 2050 {
        at.format(format_description!(
            "[year repr:last_two][month][day][hour][minute][second]Z"
        ))?
    } else {
        at.format(format_description!(
            "[year][month][day][hour][minute][second]Z"
        ))?
    };
    Ok(formatted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_serial() {
        assert_eq!(format_serial(1), "01");
        assert_eq!(format_serial(0x0a), "0A");
        assert_eq!(format_serial(0x100), "0100");
        assert_eq!(format_serial(0xabcd), "ABCD");
    }

    #[test]
    fn test_serial_bytes() {
        assert_eq!(serial_bytes(0), vec![0]);
        assert_eq!(serial_bytes(2), vec![2]);
        assert_eq!(serial_bytes(0x1234), vec![0x12, 0x34]);
    }

    #[test]
    fn test_index_time() {
        let at = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        assert_eq!(index_time(at).unwrap(), "231114221320Z");
        let late = OffsetDateTime::from_unix_timestamp(2_600_000_000).unwrap();
        assert_eq!(index_time(late).unwrap(), "20520522141320Z");
    }

    #[test]
    fn test_serial_file_advances() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CaLayout::new(dir.path());
        let ledger = Ledger::new(&layout);
        ledger.initialize().unwrap();

        assert_eq!(fs::read_to_string(layout.serial_file()).unwrap(), "01\n");
        assert_eq!(ledger.next_serial().unwrap(), 1);
        ledger.advance(1).unwrap();
        assert_eq!(fs::read_to_string(layout.serial_file()).unwrap(), "02\n");
        assert_eq!(ledger.next_serial().unwrap(), 2);
        assert!(ledger.entries().unwrap().is_empty());
    }

    #[test]
    fn test_entry_line_round_trip() {
        let entry = LedgerEntry {
            status: 'V',
            expires: "341114221320Z".to_string(),
            serial: "02".to_string(),
            subject: "/O=Local CA/CN=web".to_string(),
        };
        let line = entry.to_line();
        assert_eq!(line, "V\t341114221320Z\t\t02\tunknown\t/O=Local CA/CN=web");
        assert_eq!(LedgerEntry::parse(&line), Some(entry));
    }
}
