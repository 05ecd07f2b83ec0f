//! Shared constants for request validation and cache-key derivation.

/// File extensions the proxy will transform.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "gif"];

/// Query parameters recognized as transform instructions. A request whose
/// parameter keys share nothing with this list has nothing to process.
pub const ALLOWED_PARAMS: [&str; 15] = [
    "w",          // resize to a certain width
    "h",          // resize to a certain height
    "resize",     // resize to an exact size
    "fit",        // resize bounded by aspect ratio
    "quality",    // override encoding quality
    "crop",       // extract a region of the image
    "webp",       // re-encode as webp
    "rotate",     // rotate 0, 90, 180 or 270 degrees
    "flip",       // flip vertically
    "flop",       // flip horizontally
    "negative",   // invert colors
    "grayscale",  // convert to black and white
    "greyscale",  // alias of grayscale
    "lb",         // letterbox at a certain size
    "background", // background color of the letterbox
];

/// Key prefix under which transformed artifacts are stored.
pub const CACHE_PREFIX: &str = "resized/";

/// WebP quality used when `quality` is absent or unparseable.
pub const DEFAULT_WEBP_QUALITY: u8 = 80;

/// Letterbox background used when `background` is absent.
pub const DEFAULT_LETTERBOX_BACKGROUND: &str = "black";
