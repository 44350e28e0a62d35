/// Remote data ingestion: fetching the real-time CSV feed and turning it
/// into observations.
pub mod csv_parse;
pub mod wateroffice;

#[cfg(test)]
pub(crate) mod fixtures;
