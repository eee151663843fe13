use crate::error::WriteError;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use model::records::record::{RECORD_FIELDS, Record};

/// Checks that `delimiter` is a single ASCII character other than a line break.
pub fn parse_delimiter(delimiter: &str) -> Result<u8, WriteError> {
    match delimiter.as_bytes() {
        [b] if b.is_ascii() && *b != b'\n' && *b != b'\r' => Ok(*b),
        _ => Err(WriteError::InvalidDelimiter(delimiter.to_string())),
    }
}

/// Renders records as delimited lines using a fixed field order.
///
/// Values are not quoted or escaped. A value containing the delimiter or a
/// line break cannot be represented and is reported as an error instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedLineAggregator {
    delimiter: u8,
    fields: Vec<String>,
}

impl DelimitedLineAggregator {
    pub fn new<I, S>(delimiter: &str, fields: I) -> Result<Self, WriteError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let delimiter = parse_delimiter(delimiter)?;

        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if let Some(unknown) = fields.iter().find(|f| !Record::is_known_field(f)) {
            return Err(WriteError::UnknownField(unknown.clone()));
        }

        Ok(Self { delimiter, fields })
    }

    pub fn delimiter(&self) -> char {
        char::from(self.delimiter)
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Serializes every record, one `\n`-terminated line each. Nothing is
    /// returned unless all of them are representable.
    pub fn render(&self, records: &[Record]) -> Result<Vec<u8>, WriteError> {
        let mut buffer = Vec::new();
        {
            let mut writer = WriterBuilder::new()
                .delimiter(self.delimiter)
                .quote_style(QuoteStyle::Never)
                .terminator(Terminator::Any(b'\n'))
                .has_headers(false)
                .from_writer(&mut buffer);

            for record in records {
                writer.write_record(self.values(record)?)?;
            }
            writer.flush()?;
        }
        Ok(buffer)
    }

    fn values(&self, record: &Record) -> Result<Vec<String>, WriteError> {
        let mut values = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = record
                .field(field)
                .ok_or_else(|| WriteError::UnknownField(field.clone()))?;

            if value.as_bytes().contains(&self.delimiter) {
                return Err(WriteError::DelimiterInField {
                    id: record.id,
                    field: field.clone(),
                    delimiter: self.delimiter().to_string(),
                });
            }
            if value.contains(['\n', '\r']) {
                return Err(WriteError::LineBreakInField {
                    id: record.id,
                    field: field.clone(),
                });
            }
            values.push(value);
        }
        Ok(values)
    }
}

impl Default for DelimitedLineAggregator {
    fn default() -> Self {
        Self {
            delimiter: b',',
            fields: RECORD_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }
}
