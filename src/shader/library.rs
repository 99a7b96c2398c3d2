//! GLSL snippets shared by the built-in pipelines
//!
//! Every snippet is plain text. Pipelines concatenate them in front of their
//! own `main` and switch optional parts with `#if` directives, so a uniform is
//! only declared when the code that reads it is compiled in. Drivers drop
//! uniforms nothing reads, which would fail the declaration.

/// Vertex stage for lit surfaces.
///
/// Directives: `USE_NORMALS`, `USE_COORDS`, `USE_TANGENTS`.
pub const SURFACE_VERTEX: &str = r#"
in vec3 points;
#if USE_NORMALS
in vec3 normals;
#endif
#if USE_COORDS
in vec2 coords;
#endif
#if USE_TANGENTS
in vec3 tangents;
#endif

uniform mat4 projectionMatrix;
uniform mat4 viewMatrix;
uniform mat4 modelMatrix;
#if USE_NORMALS
uniform mat3 normalMatrix;
#endif

out vec3 vViewPosition;
#if USE_NORMALS
out vec3 vNormal;
#endif
#if USE_COORDS
out vec2 vCoord;
#endif
#if USE_TANGENTS
out vec3 vTangent;
#endif

void main() {
    vec4 viewPosition = viewMatrix * modelMatrix * vec4(points, 1.0);
    vViewPosition = viewPosition.xyz;
#if USE_NORMALS
    vNormal = normalMatrix * normals;
#endif
#if USE_COORDS
    vCoord = coords;
#endif
#if USE_TANGENTS
    vTangent = mat3(viewMatrix * modelMatrix) * tangents;
#endif
    gl_Position = projectionMatrix * viewPosition;
}
"#;

/// Material inputs of a surface fragment stage.
///
/// Directives: `USE_ALBEDO`, `USE_EMISSIVE`, `USE_SPECULAR`, `USE_NORMALS` and
/// the `USE_*_MAP` flags. Each enabled group provides a `surface*()` function
/// the caller must use.
pub const SURFACE_MATERIAL: &str = r#"
in vec3 vViewPosition;
#if USE_NORMALS
in vec3 vNormal;
#endif
#if USE_COORDS
in vec2 vCoord;
#endif
#if USE_TANGENTS
in vec3 vTangent;
#endif

#if USE_ALBEDO
uniform vec4 albedoFactor;
#if USE_ALBEDO_MAP
uniform sampler2D albedoMap;
#endif
vec3 surfaceAlbedo() {
#if USE_ALBEDO_MAP
    return albedoFactor.rgb * texture(albedoMap, vCoord).rgb;
#else
    return albedoFactor.rgb;
#endif
}
#endif

#if USE_EMISSIVE
uniform vec3 emissiveFactor;
#if USE_EMISSIVE_MAP
uniform sampler2D emissiveMap;
#endif
vec3 surfaceEmissive() {
#if USE_EMISSIVE_MAP
    return emissiveFactor * texture(emissiveMap, vCoord).rgb;
#else
    return emissiveFactor;
#endif
}
#endif

#if USE_SPECULAR
uniform float glossFactor;
uniform float shininess;
#if USE_GLOSS_MAP
uniform sampler2D glossMap;
#endif
float surfaceGloss() {
#if USE_GLOSS_MAP
    return glossFactor * texture(glossMap, vCoord).r;
#else
    return glossFactor;
#endif
}
float surfaceShininess() {
    return shininess;
}
#endif

#if USE_NORMALS
#if USE_NORMAL_MAP
uniform sampler2D normalMap;
#endif
vec3 surfaceNormal() {
    vec3 n = normalize(vNormal);
#if USE_NORMAL_MAP
    vec3 t = normalize(vTangent - n * dot(vTangent, n));
    vec3 b = cross(n, t);
    n = normalize(mat3(t, b, n) * (texture(normalMap, vCoord).xyz * 2.0 - 1.0));
#endif
    return n;
}
#endif
"#;

/// Spheremap normal packing into two `[0, 1]` components.
pub const NORMAL_ENCODING: &str = r#"
vec2 encodeNormal(vec3 n) {
    float p = sqrt(n.z * 8.0 + 8.0);
    if (p < 1e-6) {
        return vec2(1.0, 0.5);
    }
    return n.xy / p + 0.5;
}

vec3 decodeNormal(vec2 enc) {
    vec2 fenc = enc * 4.0 - 2.0;
    float f = dot(fenc, fenc);
    float g = sqrt(max(1.0 - f / 4.0, 0.0));
    return vec3(fenc * g, 1.0 - f / 2.0);
}
"#;

/// Reciprocal shininess packing into `(0, 1]`.
pub const SHININESS_ENCODING: &str = r#"
float encodeShininess(float shininess) {
    return 1.0 / shininess;
}

float decodeShininess(float encoded) {
    return 1.0 / encoded;
}
"#;

/// Blinn-Phong terms, returned as `(diffuse, specular)`, and point-light falloff.
pub const REFLECTANCE: &str = r#"
vec2 reflectance(vec3 normal, vec3 eye, vec3 toLight, float gloss, float shininess) {
    float diffuse = max(dot(normal, toLight), 0.0);
    vec3 halfway = normalize(toLight + eye);
    float specular = diffuse > 0.0 ? gloss * pow(max(dot(normal, halfway), 0.0), shininess) : 0.0;
    return vec2(diffuse, specular);
}

float attenuation(float range, float radius) {
    float falloff = clamp(1.0 - range / radius, 0.0, 1.0);
    return falloff * falloff;
}
"#;

/// Depth comparison against a shadow map, 1.0 when lit.
pub const SHADOW_TEST: &str = r#"
float shadowVisibility(sampler2D map, vec4 shadowCoord, float bias) {
    vec3 coord = shadowCoord.xyz / shadowCoord.w;
    if (coord.x < 0.0 || coord.x > 1.0 || coord.y < 0.0 || coord.y > 1.0 || coord.z > 1.0) {
        return 1.0;
    }
    return coord.z - bias > texture(map, coord.xy).r ? 0.0 : 1.0;
}
"#;

/// View-space position from a depth sample and the window coordinate.
pub const VIEW_POSITION: &str = r#"
vec3 viewPosition(mat4 inverseProjection, vec2 fragCoord, vec2 viewportSize, float depth) {
    vec4 ndc = vec4(fragCoord / viewportSize * 2.0 - 1.0, depth * 2.0 - 1.0, 1.0);
    vec4 view = inverseProjection * ndc;
    return view.xyz / view.w;
}
"#;

/// Position-only transform, for depth passes and light volumes.
pub const TRANSFORM_VERTEX: &str = r#"
in vec3 points;

uniform mat4 projectionMatrix;
uniform mat4 viewMatrix;
uniform mat4 modelMatrix;

void main() {
    gl_Position = projectionMatrix * viewMatrix * modelMatrix * vec4(points, 1.0);
}
"#;

/// Pass-through for the clip-space full-screen quad.
pub const FULLSCREEN_VERTEX: &str = r#"
in vec3 points;

void main() {
    gl_Position = vec4(points.xy, 0.0, 1.0);
}
"#;

/// Fragment stage that writes depth only.
pub const DEPTH_FRAGMENT: &str = r#"
void main() {
}
"#;

/// Join snippets and a `main` body into one stage.
pub fn stage(parts: &[&str]) -> String {
    parts.concat()
}
