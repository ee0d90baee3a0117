mod simple_makefiles;
mod specific_features;
