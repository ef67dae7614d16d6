mod tests_attribute;
mod tests_relationship;
