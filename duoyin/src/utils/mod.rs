pub mod dict_cache;
