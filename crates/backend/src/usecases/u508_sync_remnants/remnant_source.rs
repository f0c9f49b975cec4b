//! Загрузка прайса остатков поставщика.
//!
//! Поставщик публикует архив `ostatki.zip` с листом `ostatki.xls`.
//! Лист читается через calamine, CSV-выгрузка того же листа поддерживается
//! как запасной формат. Над шапкой может быть произвольное количество
//! служебных строк, колонки ищутся по заголовкам.

use async_trait::async_trait;
use calamine::{open_workbook_auto_from_rs, Reader};
use contracts::usecases::u508_sync_remnants::RemnantRecord;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemnantSourceError {
    #[error("failed to download remnants: {0}")]
    Download(String),

    #[error("failed to parse remnants at row {row}: {message}")]
    Parse { row: usize, message: String },
}

impl RemnantSourceError {
    fn parse(row: usize, message: impl Into<String>) -> Self {
        RemnantSourceError::Parse {
            row,
            message: message.into(),
        }
    }
}

/// Источник строк остатков (один снимок на прогон)
#[async_trait]
pub trait RemnantSource: Send + Sync {
    async fn fetch_remnants(&self) -> Result<Vec<RemnantRecord>, RemnantSourceError>;
}

/// Где лежит прайс
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemnantLocation {
    Url(String),
    Path(PathBuf),
}

/// Разметка листа остатков
#[derive(Debug, Clone)]
pub struct SpreadsheetLayout {
    /// Разделитель для CSV-выгрузки
    pub delimiter: u8,
    /// Сколько строк пропустить до строки заголовков
    pub header_row: usize,
    pub code_column: String,
    pub quantity_column: String,
    pub price_column: String,
    /// Расширение файла внутри архива
    pub archive_extension: String,
}

impl Default for SpreadsheetLayout {
    fn default() -> Self {
        Self {
            delimiter: b';',
            header_row: 0,
            code_column: "Код".to_string(),
            quantity_column: "Количество".to_string(),
            price_column: "Цена".to_string(),
            archive_extension: ".xls".to_string(),
        }
    }
}

/// Прайс остатков по URL или из локального файла (zip, xls/xlsx или csv)
pub struct SpreadsheetRemnantSource {
    location: RemnantLocation,
    layout: SpreadsheetLayout,
    client: reqwest::Client,
}

impl SpreadsheetRemnantSource {
    pub fn new(
        location: RemnantLocation,
        layout: SpreadsheetLayout,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            location,
            layout,
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    async fn load_bytes(&self) -> Result<Vec<u8>, RemnantSourceError> {
        match &self.location {
            RemnantLocation::Url(url) => {
                tracing::info!("Downloading remnants from {}", url);
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| RemnantSourceError::Download(format!("{}: {}", url, e)))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(RemnantSourceError::Download(format!(
                        "{} returned HTTP {}",
                        url, status
                    )));
                }

                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| RemnantSourceError::Download(format!("{}: {}", url, e)))?;
                Ok(bytes.to_vec())
            }
            RemnantLocation::Path(path) => {
                tracing::info!("Reading remnants from {}", path.display());
                std::fs::read(path)
                    .map_err(|e| RemnantSourceError::Download(format!("{}: {}", path.display(), e)))
            }
        }
    }
}

#[async_trait]
impl RemnantSource for SpreadsheetRemnantSource {
    async fn fetch_remnants(&self) -> Result<Vec<RemnantRecord>, RemnantSourceError> {
        let bytes = self.load_bytes().await?;
        let records = parse_remnants(bytes, &self.layout)?;
        tracing::info!("Loaded {} remnant rows", records.len());
        Ok(records)
    }
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
/// Compound File Binary: контейнер `.xls` (BIFF8)
const CFB_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
/// Признак того, что zip сам является книгой `.xlsx`
const XLSX_MARKER: &str = "[Content_Types].xml";

/// Скачанный файл целиком: архив с листом, книга или CSV
pub fn parse_remnants(
    bytes: Vec<u8>,
    layout: &SpreadsheetLayout,
) -> Result<Vec<RemnantRecord>, RemnantSourceError> {
    let content = extract_entry(bytes, &layout.archive_extension)?;
    if content.starts_with(CFB_MAGIC) || content.starts_with(ZIP_MAGIC) {
        parse_remnants_workbook(content, layout)
    } else {
        let text = String::from_utf8(content)
            .map_err(|e| RemnantSourceError::parse(0, format!("remnants are not UTF-8: {}", e)))?;
        parse_remnants_csv(text.trim_start_matches('\u{feff}').as_bytes(), layout)
    }
}

/// Первый файл архива с нужным расширением. Не-архив и `.xlsx` возвращаются как есть.
pub fn extract_entry(bytes: Vec<u8>, extension: &str) -> Result<Vec<u8>, RemnantSourceError> {
    if !bytes.starts_with(ZIP_MAGIC) {
        return Ok(bytes);
    }

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| RemnantSourceError::parse(0, format!("unreadable archive: {}", e)))?;
    if archive.index_for_name(XLSX_MARKER).is_some() {
        return Ok(archive.into_inner().into_inner());
    }

    let extension = extension.to_lowercase();
    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .map_err(|e| RemnantSourceError::parse(0, format!("unreadable archive entry: {}", e)))?;
        if !file.name().to_lowercase().ends_with(&extension) {
            continue;
        }
        tracing::debug!("Using archive entry {}", file.name());
        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .map_err(|e| RemnantSourceError::parse(0, format!("unreadable archive entry: {}", e)))?;
        return Ok(content);
    }

    Err(RemnantSourceError::parse(
        0,
        format!("archive has no '{}' entry", extension),
    ))
}

/// Разбор первого листа книги (`.xls` или `.xlsx`).
///
/// Пустые строки над первой заполненной ячейкой сохраняются, чтобы
/// `header_row` и номера строк в ошибках совпадали с листом.
pub fn parse_remnants_workbook(
    content: Vec<u8>,
    layout: &SpreadsheetLayout,
) -> Result<Vec<RemnantRecord>, RemnantSourceError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(content))
        .map_err(|e| RemnantSourceError::parse(0, format!("unreadable workbook: {}", e)))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| RemnantSourceError::parse(0, "workbook has no sheets"))?
        .map_err(|e| RemnantSourceError::parse(0, format!("unreadable sheet: {}", e)))?;

    let leading_rows = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let rows = std::iter::repeat_with(|| Ok::<Vec<String>, String>(Vec::new()))
        .take(leading_rows)
        .chain(
            range
                .rows()
                .map(|row| Ok(row.iter().map(|cell| cell.to_string()).collect::<Vec<String>>())),
        );
    records_from_rows(rows, layout)
}

/// Разбор CSV-выгрузки листа остатков
pub fn parse_remnants_csv<R: Read>(
    reader: R,
    layout: &SpreadsheetLayout,
) -> Result<Vec<RemnantRecord>, RemnantSourceError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(layout.delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let rows = csv_reader.records().map(|row| {
        row.map(|record| record.iter().map(str::to_string).collect::<Vec<String>>())
            .map_err(|e| e.to_string())
    });
    records_from_rows(rows, layout)
}

/// Шапка и строки листа в записи остатков.
///
/// Номера строк в ошибках 1-based, как в исходном листе.
fn records_from_rows<I>(
    mut rows: I,
    layout: &SpreadsheetLayout,
) -> Result<Vec<RemnantRecord>, RemnantSourceError>
where
    I: Iterator<Item = Result<Vec<String>, String>>,
{
    for skipped in 0..layout.header_row {
        match rows.next() {
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(RemnantSourceError::parse(skipped + 1, e)),
            None => {
                return Err(RemnantSourceError::parse(
                    skipped + 1,
                    "sheet ends before the header row",
                ))
            }
        }
    }

    let header_line = layout.header_row + 1;
    let header = match rows.next() {
        Some(Ok(header)) => header,
        Some(Err(e)) => return Err(RemnantSourceError::parse(header_line, e)),
        None => return Err(RemnantSourceError::parse(header_line, "header row is missing")),
    };

    let column = |title: &str| {
        header
            .iter()
            .position(|cell| cell.trim() == title)
            .ok_or_else(|| RemnantSourceError::parse(header_line, format!("column '{}' not found", title)))
    };
    let code_idx = column(&layout.code_column)?;
    let quantity_idx = column(&layout.quantity_column)?;
    let price_idx = column(&layout.price_column)?;

    let mut records = Vec::new();
    for (offset, row) in rows.enumerate() {
        let line = header_line + offset + 1;
        let row = row.map_err(|e| RemnantSourceError::parse(line, e))?;

        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let field = |idx: usize, title: &str| -> Result<String, RemnantSourceError> {
            match row.get(idx).map(|cell| cell.trim()) {
                Some(value) if !value.is_empty() => Ok(value.to_string()),
                Some(_) => Err(RemnantSourceError::parse(line, format!("empty '{}'", title))),
                None => Err(RemnantSourceError::parse(line, format!("missing '{}'", title))),
            }
        };

        records.push(RemnantRecord {
            code: field(code_idx, &layout.code_column)?,
            quantity_descriptor: field(quantity_idx, &layout.quantity_column)?,
            price_text: field(price_idx, &layout.price_column)?,
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SHEET: &str = "Остатки на 01.05.2024;;\n\
                         ;;\n\
                         Наименование;Код;Количество;Цена\n\
                         Casio A158;A158;>10;5'990.00 руб.\n\
                         ;;;\n\
                         Casio F91;F91;1;1'290.00 руб.\n";

    fn layout() -> SpreadsheetLayout {
        SpreadsheetLayout {
            header_row: 2,
            ..SpreadsheetLayout::default()
        }
    }

    #[test]
    fn test_parse_skips_preamble_and_blank_rows() {
        let records = parse_remnants_csv(SHEET.as_bytes(), &layout()).unwrap();
        assert_eq!(
            records,
            vec![
                RemnantRecord::new("A158", ">10", "5'990.00 руб."),
                RemnantRecord::new("F91", "1", "1'290.00 руб."),
            ]
        );
    }

    #[test]
    fn test_missing_column_is_parse_error() {
        let sheet = "Код;Количество\nA;5\n";
        let err = parse_remnants_csv(sheet.as_bytes(), &SpreadsheetLayout::default()).unwrap_err();
        match err {
            RemnantSourceError::Parse { row, message } => {
                assert_eq!(row, 1);
                assert!(message.contains("Цена"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_empty_field_reports_sheet_row() {
        let sheet = "Код;Количество;Цена\nA;5;100.00\nB;;200.00\n";
        let err = parse_remnants_csv(sheet.as_bytes(), &SpreadsheetLayout::default()).unwrap_err();
        match err {
            RemnantSourceError::Parse { row, message } => {
                assert_eq!(row, 3);
                assert!(message.contains("Количество"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_short_row_is_parse_error() {
        let sheet = "Код;Количество;Цена\nA;5\n";
        let err = parse_remnants_csv(sheet.as_bytes(), &SpreadsheetLayout::default()).unwrap_err();
        assert!(matches!(err, RemnantSourceError::Parse { row: 2, .. }));
    }

    #[test]
    fn test_sheet_shorter_than_preamble() {
        let err = parse_remnants_csv("one line\n".as_bytes(), &layout()).unwrap_err();
        assert!(matches!(err, RemnantSourceError::Parse { .. }));
    }

    fn zip_with(name: &str, content: &[u8]) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            let options = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Stored);
            writer.start_file("readme.txt", options).unwrap();
            writer.write_all(b"not this one").unwrap();
            writer.start_file(name, options).unwrap();
            writer.write_all(content).unwrap();
            writer.finish().unwrap();
        }
        buffer.into_inner()
    }

    enum Cell {
        Text(&'static str),
        Number(f64),
    }

    /// Минимальная книга OOXML: один лист, строки общих строк, числа как есть
    fn workbook(rows: &[(u32, Vec<Cell>)]) -> Vec<u8> {
        let mut shared = Vec::new();
        let mut sheet_data = String::new();
        for (row_number, cells) in rows {
            sheet_data.push_str(&format!("<row r=\"{}\">", row_number));
            for (idx, cell) in cells.iter().enumerate() {
                let reference = format!("{}{}", (b'A' + idx as u8) as char, row_number);
                match cell {
                    Cell::Text(text) => {
                        sheet_data.push_str(&format!(
                            "<c r=\"{}\" t=\"s\"><v>{}</v></c>",
                            reference,
                            shared.len()
                        ));
                        shared.push(*text);
                    }
                    Cell::Number(value) => {
                        sheet_data.push_str(&format!("<c r=\"{}\"><v>{}</v></c>", reference, value));
                    }
                }
            }
            sheet_data.push_str("</row>");
        }

        let shared_strings: String = shared
            .iter()
            .map(|text| format!("<si><t>{}</t></si>", text))
            .collect();

        let files = [
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/></Types>"#.to_string(),
            ),
            (
                "_rels/.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#.to_string(),
            ),
            (
                "xl/workbook.xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Остатки" sheetId="1" r:id="rId1"/></sheets></workbook>"#.to_string(),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/></Relationships>"#.to_string(),
            ),
            (
                "xl/worksheets/sheet1.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{}</sheetData></worksheet>"#,
                    sheet_data
                ),
            ),
            (
                "xl/sharedStrings.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">{1}</sst>"#,
                    shared.len(),
                    shared_strings
                ),
            ),
        ];

        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            let options = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Stored);
            for (name, content) in files {
                writer.start_file(name, options).unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        buffer.into_inner()
    }

    fn supplier_sheet() -> Vec<u8> {
        workbook(&[
            (1, vec![Cell::Text("Остатки на 01.05.2024")]),
            (
                3,
                vec![
                    Cell::Text("Наименование"),
                    Cell::Text("Код"),
                    Cell::Text("Количество"),
                    Cell::Text("Цена"),
                ],
            ),
            (
                4,
                vec![
                    Cell::Text("Casio A158"),
                    Cell::Text("A158"),
                    Cell::Text(">10"),
                    Cell::Text("5'990.00 руб."),
                ],
            ),
            (
                6,
                vec![
                    Cell::Text("Casio F91"),
                    Cell::Text("F91"),
                    Cell::Number(1.0),
                    Cell::Number(1290.5),
                ],
            ),
        ])
    }

    #[test]
    fn test_xls_entry_in_supplier_archive() {
        // Формат книги определяется по содержимому, имя как у поставщика
        let archive = zip_with("ostatki.xls", &supplier_sheet());

        let records = parse_remnants(archive, &layout()).unwrap();
        assert_eq!(
            records,
            vec![
                RemnantRecord::new("A158", ">10", "5'990.00 руб."),
                RemnantRecord::new("F91", "1", "1290.5"),
            ]
        );
    }

    #[test]
    fn test_workbook_keeps_sheet_row_numbers() {
        // Лист начинается с шапки на третьей строке: две пустые строки сверху не теряются
        let sheet = workbook(&[
            (
                3,
                vec![Cell::Text("Код"), Cell::Text("Количество"), Cell::Text("Цена")],
            ),
            (4, vec![Cell::Text("A"), Cell::Number(5.0), Cell::Text("100.00")]),
            (5, vec![Cell::Text("B"), Cell::Number(2.0)]),
        ]);

        let err = parse_remnants(sheet, &layout()).unwrap_err();
        match err {
            RemnantSourceError::Parse { row, message } => {
                assert_eq!(row, 5);
                assert!(message.contains("Цена"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_workbook_missing_column_is_parse_error() {
        let sheet = workbook(&[(1, vec![Cell::Text("Код"), Cell::Text("Количество")])]);
        let err = parse_remnants(sheet, &SpreadsheetLayout::default()).unwrap_err();
        assert!(matches!(err, RemnantSourceError::Parse { row: 1, .. }));
    }

    #[test]
    fn test_corrupt_xls_is_parse_error() {
        let mut content = CFB_MAGIC.to_vec();
        content.extend_from_slice(b"truncated");
        let archive = zip_with("ostatki.xls", &content);

        let err = parse_remnants(archive, &layout()).unwrap_err();
        assert!(matches!(err, RemnantSourceError::Parse { row: 0, .. }));
    }

    #[test]
    fn test_csv_entry_in_archive() {
        let archive = zip_with("OSTATKI.CSV", "\u{feff}Код;Количество;Цена\nA;7;100.00\n".as_bytes());
        let layout = SpreadsheetLayout {
            archive_extension: ".csv".into(),
            ..SpreadsheetLayout::default()
        };

        let records = parse_remnants(archive, &layout).unwrap();
        assert_eq!(records, vec![RemnantRecord::new("A", "7", "100.00")]);
    }

    #[test]
    fn test_archive_without_matching_entry() {
        let archive = zip_with("ostatki.csv", b"a;b\n");
        let err = extract_entry(archive, ".xls").unwrap_err();
        assert!(matches!(err, RemnantSourceError::Parse { row: 0, .. }));
    }

    #[test]
    fn test_plain_bytes_pass_through() {
        let content = extract_entry(b"a;b\n".to_vec(), ".xls").unwrap();
        assert_eq!(content, b"a;b\n");
    }

    #[tokio::test]
    async fn test_file_source_reads_local_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ostatki.csv");
        std::fs::write(&path, "Код;Количество;Цена\nA;7;100.00\n").unwrap();

        let source = SpreadsheetRemnantSource::new(
            RemnantLocation::Path(path),
            SpreadsheetLayout::default(),
            Duration::from_secs(5),
        )
        .unwrap();

        let records = source.fetch_remnants().await.unwrap();
        assert_eq!(records, vec![RemnantRecord::new("A", "7", "100.00")]);
    }

    #[tokio::test]
    async fn test_missing_file_is_download_error() {
        let source = SpreadsheetRemnantSource::new(
            RemnantLocation::Path(PathBuf::from("/definitely/not/here.csv")),
            SpreadsheetLayout::default(),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = source.fetch_remnants().await.unwrap_err();
        assert!(matches!(err, RemnantSourceError::Download(_)));
    }
}
