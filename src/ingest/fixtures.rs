/// Test fixtures: representative CSV bodies from the real-time data service.
///
/// They reflect the inline CSV returned by:
///   https://wateroffice.ec.gc.ca/services/real_time_data/csv/inline?...
///
/// Response shape:
///   - UTF-8, usually prefixed with a byte-order mark
///   - header row with bilingual names, e.g.
///     `ID,Date,Parameter/Paramètre,Value/Valeur,Qualifier/Qualificatif,...`
///   - one row per station, timestamp and parameter
///
/// Values are published as text and are kept that way.

/// Three stations, BOM-prefixed, with the full set of trailing columns.
#[cfg(test)]
pub(crate) fn fixture_realtime_csv() -> &'static str {
    "\u{feff} ID ,Date,Parameter/Paramètre,Value/Valeur,Qualifier/Qualificatif,Symbol/Symbole,Approval/Approbation,Grade/Classification,Qualifiers/Qualificatifs\r\n\
     05OJ005,2020-08-24 00:05:00,46,234.567,,,Provisional/Provisoire,-1,\r\n\
     05OJ005,2020-08-24 00:05:00,47,10.2,,,Provisional/Provisoire,-1,\r\n\
     05OJ021,2020-08-24 00:05:00,46,231.004,,,Provisional/Provisoire,-1,\r\n\
     05OJ024,2020-08-24 00:10:00,3,1.23,,,Provisional/Provisoire,-1,\r\n"
}

/// French-first header names in a different column order, with an extra
/// column in the middle.
#[cfg(test)]
pub(crate) fn fixture_reordered_french_first_csv() -> &'static str {
    "Valeur/Value,Symbole/Symbol,Paramètre/Parameter,Date,ID\n\
     12.4,,47,2020-08-24 00:05:00,05OJ021\n\
     231.1,,46,2020-08-24 00:10:00,05OJ021\n"
}

/// The same reading published twice in one response.
#[cfg(test)]
pub(crate) fn fixture_duplicate_row_csv() -> &'static str {
    "\u{feff}ID,Date,Parameter/Paramètre,Value/Valeur\n\
     05OJ005,2020-08-24 00:05:00,3,1.23\n\
     05OJ005,2020-08-24 00:05:00,3,1.23\n"
}

/// A window with no new data: header row only.
#[cfg(test)]
pub(crate) fn fixture_header_only_csv() -> &'static str {
    "\u{feff}ID,Date,Parameter/Paramètre,Value/Valeur,Qualifier/Qualificatif\r\n"
}

/// A header that lost its value column.
#[cfg(test)]
pub(crate) fn fixture_missing_value_column_csv() -> &'static str {
    "ID,Date,Parameter/Paramètre,Qualifier/Qualificatif\n\
     05OJ005,2020-08-24 00:05:00,46,\n"
}
