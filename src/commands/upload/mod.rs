mod ingest;
mod report;
mod run;
#[cfg(test)]
mod tests;
mod types;

pub use run::run;
