pub mod best_image;
