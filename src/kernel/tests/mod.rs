mod helpers;

mod tests_bind;
mod tests_files;
mod tests_pipeline;
mod tests_reload;
mod tests_schema_graph;
