pub mod csv_table;
pub mod locale;
pub mod normalize;
