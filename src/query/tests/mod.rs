mod tests_path;
mod tests_predicate;
