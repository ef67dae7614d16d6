mod tests_parse;
mod tests_range;
