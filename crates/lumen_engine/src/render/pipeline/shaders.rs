//! Built-in GLSL sources
//!
//! Every pipeline links a fixed stage set from these sources. Uniform names
//! match the setters used by cameras, lights, materials and meshes.

use crate::render::api::{ShaderSource, ShaderStage};

const MESH_VS: &str = r"
#version 460 core

layout(location = 0) in vec3 a_vertex;
layout(location = 1) in vec3 a_normal;
layout(location = 2) in vec2 a_uv;

uniform mat4 modelviewMat;
uniform mat4 projectionMat;
uniform mat3 normalMat;
uniform mat4 lightMatrix;

out vec4 fragPosition;
out vec4 fragPosLightSpace;
out vec3 normal;
out vec2 uv;

void main()
{
   normal = normalMat * a_normal;
   uv = a_uv;
   fragPosition = modelviewMat * vec4(a_vertex, 1.0);
   fragPosLightSpace = lightMatrix * fragPosition;
   gl_Position = projectionMat * fragPosition;
}";

const FORWARD_FS: &str = r"
#version 460 core

uniform vec3 mtlEmission;
uniform vec3 mtlAlbedo;
uniform float mtlOpacity;
uniform float mtlRoughness;
uniform float mtlMetalness;

uniform vec3 lightColor;
uniform vec3 lightAmbient;
uniform vec3 lightPosition;

layout(binding = 3) uniform sampler2D shadowMap;

in vec4 fragPosition;
in vec4 fragPosLightSpace;
in vec3 normal;
in vec2 uv;

out vec4 outFragment;

float shadowFactor()
{
   vec3 coords = fragPosLightSpace.xyz / fragPosLightSpace.w * 0.5 + 0.5;
   if (coords.z > 1.0)
      return 1.0;
   float closest = texture(shadowMap, coords.xy).r;
   return coords.z - 0.002 > closest ? 0.0 : 1.0;
}

void main()
{
   vec3 N = normalize(normal);
   vec3 V = normalize(-fragPosition.xyz);
   vec3 L = normalize(lightPosition - fragPosition.xyz);

   vec3 color = mtlEmission + lightAmbient * mtlAlbedo;
   if (dot(N, V) > 0.0)
   {
      float shininess = mix(128.0, 4.0, mtlRoughness);
      vec3 H = normalize(L + V);
      vec3 lit = max(0.0, dot(N, L)) * mtlAlbedo
               + pow(max(0.0, dot(N, H)), shininess) * mix(vec3(0.04), mtlAlbedo, mtlMetalness);
      color += shadowFactor() * lit * lightColor;
   }
   outFragment = vec4(color, mtlOpacity);
}";

const POINT_SHADOW_VS: &str = r"
#version 460 core

layout(location = 0) in vec3 a_vertex;
layout(location = 1) in vec3 a_normal;

uniform mat4 modelviewMat;
uniform mat4 projectionMat;
uniform mat3 normalMat;
uniform mat4 invViewMat;

out vec3 worldPosition;
out vec3 normal;

void main()
{
   normal = mat3(invViewMat) * (normalMat * a_normal);
   vec4 position = modelviewMat * vec4(a_vertex, 1.0);
   worldPosition = (invViewMat * position).xyz;
   gl_Position = projectionMat * position;
}";

const POINT_SHADOW_FS: &str = r"
#version 460 core

uniform vec3 mtlEmission;
uniform vec3 mtlAlbedo;
uniform float mtlOpacity;

uniform vec3 lightColor;
uniform vec3 lightAmbient;
uniform vec3 lightPosition;
uniform float farPlane;

layout(binding = 4) uniform samplerCube shadowCube;

in vec3 worldPosition;
in vec3 normal;

out vec4 outFragment;

void main()
{
   vec3 toLight = lightPosition - worldPosition;
   float current = length(toLight);
   float closest = texture(shadowCube, -toLight).r * farPlane;
   float lit = current - 0.05 > closest ? 0.0 : 1.0;

   float nDotL = max(0.0, dot(normalize(normal), toLight / current));
   vec3 color = mtlEmission + (lightAmbient + lit * nDotL * lightColor) * mtlAlbedo;
   outFragment = vec4(color, mtlOpacity);
}";

const DEPTH_VS: &str = r"
#version 460 core

layout(location = 0) in vec3 a_vertex;

uniform mat4 modelviewMat;
uniform mat4 projectionMat;

void main()
{
   gl_Position = projectionMat * modelviewMat * vec4(a_vertex, 1.0);
}";

const DEPTH_FS: &str = r"
#version 460 core

void main()
{
}";

const CUBEMAP_VS: &str = r"
#version 460 core

layout(location = 0) in vec3 a_vertex;

uniform mat4 modelviewMat;

void main()
{
   gl_Position = modelviewMat * vec4(a_vertex, 1.0);
}";

const CUBEMAP_GS: &str = r"
#version 460 core

layout(triangles) in;
layout(triangle_strip, max_vertices = 18) out;

uniform mat4 projections[6];

out vec4 fragPosition;

void main()
{
   for (int face = 0; face < 6; face++)
   {
      gl_Layer = face;
      for (int i = 0; i < 3; i++)
      {
         fragPosition = gl_in[i].gl_Position;
         gl_Position = projections[face] * fragPosition;
         EmitVertex();
      }
      EndPrimitive();
   }
}";

const CUBEMAP_FS: &str = r"
#version 460 core

uniform vec3 lightPosition;
uniform float farPlane;

in vec4 fragPosition;

void main()
{
   gl_FragDepth = length(fragPosition.xyz - lightPosition) / farPlane;
}";

const GBUFFER_VS: &str = r"
#version 460 core

layout(location = 0) in vec3 a_vertex;
layout(location = 1) in vec3 a_normal;

uniform mat4 modelviewMat;
uniform mat4 projectionMat;
uniform mat3 normalMat;

out vec4 fragPosition;
out vec3 normal;

void main()
{
   normal = normalMat * a_normal;
   fragPosition = modelviewMat * vec4(a_vertex, 1.0);
   gl_Position = projectionMat * fragPosition;
}";

const GBUFFER_FS: &str = r"
#version 460 core

uniform vec3 mtlAlbedo;
uniform float mtlRoughness;
uniform float mtlMetalness;

in vec4 fragPosition;
in vec3 normal;

layout(location = 0) out vec3 outPosition;
layout(location = 1) out vec4 outNormal;
layout(location = 2) out vec4 outMaterial;

void main()
{
   outPosition = fragPosition.xyz;
   outNormal = vec4(normalize(normal), mtlRoughness);
   outMaterial = vec4(mtlAlbedo, mtlMetalness);
}";

const FULLSCREEN_VS: &str = r"
#version 460 core

out vec2 uv;

void main()
{
   float x = -1.0 + float((gl_VertexID & 1) << 2);
   float y = -1.0 + float((gl_VertexID & 2) << 1);
   uv = vec2((x + 1.0) * 0.5, (y + 1.0) * 0.5);
   gl_Position = vec4(x, y, 1.0, 1.0);
}";

const LIGHTING_FS: &str = r"
#version 460 core

layout(binding = 0) uniform sampler2D gPosition;
layout(binding = 1) uniform sampler2D gNormal;
layout(binding = 2) uniform sampler2D gMaterial;
layout(binding = 3) uniform sampler2D shadowMap;

uniform vec3 camPos;
uniform vec3 lightPos;
uniform vec3 lightCol;
uniform mat4 lightMatrix;

in vec2 uv;

out vec4 outFragment;

void main()
{
   vec3 position = texture(gPosition, uv).xyz;
   vec4 normal = texture(gNormal, uv);
   vec4 material = texture(gMaterial, uv);

   vec4 lightSpace = lightMatrix * vec4(position, 1.0);
   vec3 coords = lightSpace.xyz / lightSpace.w * 0.5 + 0.5;
   float lit = coords.z - 0.002 > texture(shadowMap, coords.xy).r ? 0.0 : 1.0;

   vec3 N = normalize(normal.xyz);
   vec3 L = normalize(lightPos - position);
   vec3 V = normalize(camPos - position);
   vec3 H = normalize(L + V);
   float shininess = mix(128.0, 4.0, normal.w);

   vec3 color = 0.1 * material.rgb;
   color += lit * (max(0.0, dot(N, L)) * material.rgb + pow(max(0.0, dot(N, H)), shininess)) * lightCol;
   outFragment = vec4(color, 1.0);
}";

const BLIT_FS: &str = r"
#version 460 core

layout(binding = 0) uniform sampler2D source;

in vec2 uv;

out vec4 outFragment;

void main()
{
   outFragment = texture(source, uv);
}";

const PASSTHROUGH_VS: &str = r"
#version 460 core

layout(location = 0) in vec3 a_vertex;

uniform mat4 projectionMat;

void main()
{
   gl_Position = projectionMat * vec4(a_vertex, 1.0);
}";

const RAYTRACING_CS: &str = r"
#version 460 core

layout(local_size_x = 8, local_size_y = 8) in;
layout(binding = 0, rgba8) uniform writeonly image2D colorBuffer;

struct Triangle { vec4 v[3]; vec4 n[3]; uint matId; uint pad[3]; };
struct Light { vec4 position; vec4 color; };
struct BSphere { vec4 position; float radius; uint firstTriangle; uint nrOfTriangles; uint pad; };

layout(std430, binding = 0) readonly buffer Triangles { Triangle triangles[]; };
layout(std430, binding = 1) readonly buffer Lights { Light lights[]; };
layout(std430, binding = 2) readonly buffer BSpheres { BSphere bspheres[]; };

uniform uint nrOfTriangles;
uniform uint nrOfLights;
uniform uint nrOfBSpheres;
uniform vec4 eyePosition;
uniform vec4 ray00;
uniform vec4 ray01;
uniform vec4 ray10;
uniform vec4 ray11;

bool hitSphere(vec3 origin, vec3 dir, BSphere s)
{
   vec3 oc = origin - s.position.xyz;
   float b = dot(oc, dir);
   float c = dot(oc, oc) - s.radius * s.radius;
   return b * b - c >= 0.0;
}

float hitTriangle(vec3 origin, vec3 dir, Triangle t, out vec2 bary)
{
   vec3 e1 = t.v[1].xyz - t.v[0].xyz;
   vec3 e2 = t.v[2].xyz - t.v[0].xyz;
   vec3 p = cross(dir, e2);
   float det = dot(e1, p);
   if (abs(det) < 1e-6)
      return -1.0;
   vec3 s = origin - t.v[0].xyz;
   bary.x = dot(s, p) / det;
   vec3 q = cross(s, e1);
   bary.y = dot(dir, q) / det;
   if (bary.x < 0.0 || bary.y < 0.0 || bary.x + bary.y > 1.0)
      return -1.0;
   return dot(e2, q) / det;
}

void main()
{
   ivec2 pixel = ivec2(gl_GlobalInvocationID.xy);
   ivec2 size = imageSize(colorBuffer);
   if (pixel.x >= size.x || pixel.y >= size.y)
      return;

   vec2 pos = vec2(pixel) / vec2(size - 1);
   vec3 dir = normalize(mix(mix(ray00.xyz, ray01.xyz, pos.y), mix(ray10.xyz, ray11.xyz, pos.y), pos.x));
   vec3 origin = eyePosition.xyz;

   float nearest = 1e30;
   vec3 color = vec3(0.0);
   for (uint s = 0; s < nrOfBSpheres; s++)
   {
      if (!hitSphere(origin, dir, bspheres[s]))
         continue;
      uint last = bspheres[s].firstTriangle + bspheres[s].nrOfTriangles;
      for (uint i = bspheres[s].firstTriangle; i < last; i++)
      {
         vec2 bary;
         float d = hitTriangle(origin, dir, triangles[i], bary);
         if (d <= 0.0 || d >= nearest)
            continue;
         nearest = d;
         Triangle t = triangles[i];
         vec3 n = normalize((1.0 - bary.x - bary.y) * t.n[0].xyz + bary.x * t.n[1].xyz + bary.y * t.n[2].xyz);
         vec3 hit = origin + d * dir;
         color = vec3(0.0);
         for (uint l = 0; l < nrOfLights; l++)
            color += max(0.0, dot(n, normalize(lights[l].position.xyz - hit))) * lights[l].color.rgb;
      }
   }
   imageStore(colorBuffer, pixel, vec4(color, 1.0));
}";

/// Forward shading with a 2D shadow map
pub const FORWARD: [ShaderSource; 2] = [
    ShaderSource::new(ShaderStage::Vertex, MESH_VS),
    ShaderSource::new(ShaderStage::Fragment, FORWARD_FS),
];

/// Forward shading with an omnidirectional shadow cubemap
pub const POINT_SHADOW: [ShaderSource; 2] = [
    ShaderSource::new(ShaderStage::Vertex, POINT_SHADOW_VS),
    ShaderSource::new(ShaderStage::Fragment, POINT_SHADOW_FS),
];

/// Depth-only pass
pub const SHADOW_MAPPING: [ShaderSource; 2] = [
    ShaderSource::new(ShaderStage::Vertex, DEPTH_VS),
    ShaderSource::new(ShaderStage::Fragment, DEPTH_FS),
];

/// Depth cubemap in one pass through a layered geometry stage
pub const CUBEMAP: [ShaderSource; 3] = [
    ShaderSource::new(ShaderStage::Vertex, CUBEMAP_VS),
    ShaderSource::new(ShaderStage::Geometry, CUBEMAP_GS),
    ShaderSource::new(ShaderStage::Fragment, CUBEMAP_FS),
];

/// G-buffer fill
pub const GEOMETRY: [ShaderSource; 2] = [
    ShaderSource::new(ShaderStage::Vertex, GBUFFER_VS),
    ShaderSource::new(ShaderStage::Fragment, GBUFFER_FS),
];

/// Deferred lighting over a fullscreen triangle
pub const LIGHTING: [ShaderSource; 2] = [
    ShaderSource::new(ShaderStage::Vertex, FULLSCREEN_VS),
    ShaderSource::new(ShaderStage::Fragment, LIGHTING_FS),
];

/// Texture blit over a fullscreen triangle
pub const FULLSCREEN_2D: [ShaderSource; 2] = [
    ShaderSource::new(ShaderStage::Vertex, FULLSCREEN_VS),
    ShaderSource::new(ShaderStage::Fragment, BLIT_FS),
];

/// Program bound by the deferred pipeline while it sets up the camera
pub const DEFERRED: [ShaderSource; 2] = [
    ShaderSource::new(ShaderStage::Vertex, PASSTHROUGH_VS),
    ShaderSource::new(ShaderStage::Fragment, DEPTH_FS),
];

/// Ray tracing compute kernel
pub const RAYTRACING: [ShaderSource; 1] = [ShaderSource::new(ShaderStage::Compute, RAYTRACING_CS)];
